//! Reqwest-based implementation of the `ProbeHttpClient` trait.
//!
//! Provides a thin adapter around `reqwest::Client` configured with the probe
//! timeout and the identifying headers sent to targets.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

use super::{ProbeHttpClient, ProbeHttpResponse, RequestError};

/// Browser-like user agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Default total probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Reqwest-backed HTTP client used for live probes.
pub struct ReqwestProbeHttpClient {
    client: Client,
}

impl ReqwestProbeHttpClient {
    /// Creates a client with the given total timeout and user agent.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, RequestError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        let agent = HeaderValue::from_str(user_agent).map_err(|err| RequestError::Client {
            reason: format!("invalid user agent {user_agent:?}: {err}"),
        })?;
        headers.insert(USER_AGENT, agent);

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| RequestError::Client {
                reason: report(&err),
            })?;

        Ok(Self { client })
    }

    /// Wrap an existing reqwest client. Its own timeout settings apply.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProbeHttpClient for ReqwestProbeHttpClient {
    async fn fetch_headers(&self, url: &Url) -> Result<ProbeHttpResponse, RequestError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|err| map_error(url, err))?;

        // Headers only; the body is released with `response`.
        Ok(ProbeHttpResponse {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            url: response.url().clone(),
        })
    }
}

fn map_error(url: &Url, err: reqwest::Error) -> RequestError {
    if err.is_timeout() {
        RequestError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_builder() {
        RequestError::InvalidTarget {
            url: url.to_string(),
            reason: err.to_string(),
        }
    } else {
        RequestError::transport(url, report(&err))
    }
}

/// Flatten an error and its sources into one line.
fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    while let Some(source) = err.source() {
        message.push_str(": ");
        message.push_str(&source.to_string());
        err = source;
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_user_agent() {
        let err = ReqwestProbeHttpClient::new(DEFAULT_PROBE_TIMEOUT, "bad\nagent")
            .err()
            .expect("newline is not a valid header value");
        assert!(matches!(err, RequestError::Client { .. }));
        assert!(err.to_string().contains("invalid user agent"));
    }

    #[test]
    fn builds_with_defaults() {
        assert!(ReqwestProbeHttpClient::new(DEFAULT_PROBE_TIMEOUT, DEFAULT_USER_AGENT).is_ok());
    }

    #[tokio::test]
    async fn silent_target_times_out() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let client = ReqwestProbeHttpClient::new(Duration::from_secs(1), DEFAULT_USER_AGENT).unwrap();
        let url = Url::parse(&format!("http://{addr}/")).unwrap();
        let started = std::time::Instant::now();
        let err = client.fetch_headers(&url).await.unwrap_err();

        assert!(matches!(err, RequestError::Timeout { .. }), "{err:?}");
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(started.elapsed() < Duration::from_secs(5));
        silent.abort();
    }

    #[tokio::test]
    async fn unreachable_target_is_a_request_error() {
        let client = ReqwestProbeHttpClient::new(Duration::from_secs(2), DEFAULT_USER_AGENT).unwrap();
        // Port 9 on loopback is discard; nothing should be listening.
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let err = client.fetch_headers(&url).await.unwrap_err();
        assert!(matches!(
            err,
            RequestError::Transport { .. } | RequestError::Timeout { .. }
        ));
    }
}
