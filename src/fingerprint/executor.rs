//! Live probe execution.
//!
//! Sends one GET to the target, times it until the response headers arrive
//! and hands the headers to the classifier. The body is never read; the
//! transport releases it when the response value is dropped.

use std::time::Instant;

use async_trait::async_trait;
use http::HeaderMap;
use thiserror::Error;
use url::Url;

use super::analysis::classify;
use super::types::{CheckResult, ProbeResponse};

/// Contract that abstracts the HTTP transport used for probing.
///
/// Implementations perform exactly one request attempt and resolve once
/// the response headers are available.
#[async_trait]
pub trait ProbeHttpClient: Send + Sync {
    async fn fetch_headers(&self, url: &Url) -> Result<ProbeHttpResponse, RequestError>;
}

/// Status and headers of a probed response.
#[derive(Debug, Clone)]
pub struct ProbeHttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub url: Url,
}

impl ProbeHttpResponse {
    pub fn as_probe_response(&self) -> ProbeResponse<'_> {
        ProbeResponse {
            url: &self.url,
            status: self.status,
            headers: &self.headers,
        }
    }
}

/// Failure states of a live probe. Never retried.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("could not build request for {url}: {reason}")]
    InvalidTarget { url: String, reason: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("could not configure probe client: {reason}")]
    Client { reason: String },
}

impl RequestError {
    pub fn transport(url: &Url, reason: impl Into<String>) -> Self {
        Self::Transport {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Probe `url` once and classify the response.
///
/// `response_time` holds the microseconds spent until headers were
/// received; classification time is not included.
pub async fn probe(client: &dyn ProbeHttpClient, url: &Url) -> Result<CheckResult, RequestError> {
    let started = Instant::now();
    let response = client.fetch_headers(url).await?;
    let elapsed = started.elapsed();

    let micros = i64::try_from(elapsed.as_micros()).unwrap_or(i64::MAX);
    Ok(classify(&response.as_probe_response()).with_response_time(micros))
}
