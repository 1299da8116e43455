//! HTTP front end.
//!
//! `GET /single?url=<target>` runs a host check, `GET /stats` returns the
//! metrics snapshot. Every response is JSON with a permissive CORS header.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use serde::Serialize;
use tokio::net::TcpListener;

use crate::checker::{HostCheckError, HostChecker, InvalidInputError};

pub type ResponseBody = Full<Bytes>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    error_message: &'a str,
}

/// How long shutdown waits for open connections and pending cache writes.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Accept connections until `shutdown` resolves, then drain. Each connection
/// is served on its own task.
pub async fn serve<F>(
    listener: TcpListener,
    checker: Arc<HostChecker>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    serve_with_grace(listener, checker, shutdown, DEFAULT_SHUTDOWN_GRACE).await
}

/// [`serve`] with an explicit drain deadline.
///
/// After `shutdown` resolves no connection is accepted. In-flight requests
/// are answered and their connections closed, then background cache writes
/// are awaited. Each of the two phases is bounded by `grace`.
pub async fn serve_with_grace<F>(
    listener: TcpListener,
    checker: Arc<HostChecker>,
    shutdown: F,
    grace: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    let connections = GracefulShutdown::new();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        log::warn!("accept failed -> {err}");
                        continue;
                    }
                };
                let service = {
                    let checker = checker.clone();
                    service_fn(move |req| handle(checker.clone(), req))
                };
                let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                let connection = connections.watch(connection);
                tokio::spawn(async move {
                    if let Err(err) = connection.await {
                        log::debug!("connection {peer} closed with error: {err}");
                    }
                });
            }
            _ = &mut shutdown => {
                log::info!("shutdown requested, no longer accepting connections");
                break;
            }
        }
    }
    drop(listener);

    if tokio::time::timeout(grace, connections.shutdown())
        .await
        .is_err()
    {
        log::warn!("connections still open after {grace:?}, closing anyway");
    }
    if tokio::time::timeout(grace, checker.flush()).await.is_err() {
        log::warn!(
            "{} cache writes still pending after {grace:?}",
            checker.pending_writes()
        );
    }
    log::info!("server drained");
    Ok(())
}

/// Route a single request.
pub async fn handle<B>(
    checker: Arc<HostChecker>,
    req: Request<B>,
) -> Result<Response<ResponseBody>, Infallible> {
    let (parts, _) = req.into_parts();
    if parts.method != Method::GET {
        return Ok(error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
    }

    let response = match parts.uri.path() {
        "/single" => single(&checker, parts.uri.query()).await,
        "/stats" => stats(&checker),
        _ => error(StatusCode::NOT_FOUND, "Not found"),
    };
    Ok(response)
}

async fn single(checker: &HostChecker, query: Option<&str>) -> Response<ResponseBody> {
    let target = query
        .and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "url")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|value| !value.is_empty());
    let Some(target) = target else {
        return error(StatusCode::BAD_REQUEST, "No URL query parameter");
    };

    match checker.check_host(&target).await {
        Ok(result) => json(StatusCode::ACCEPTED, &result),
        Err(HostCheckError::InvalidInput(InvalidInputError::MissingUrl)) => {
            error(StatusCode::BAD_REQUEST, "No URL query parameter")
        }
        Err(err @ HostCheckError::InvalidInput(_)) => {
            log::debug!("rejected target {target:?} -> {err}");
            error(StatusCode::INTERNAL_SERVER_ERROR, "Could not parse URL")
        }
        Err(HostCheckError::Request(err)) => {
            error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

fn stats(checker: &HostChecker) -> Response<ResponseBody> {
    match checker.metrics() {
        Some(snapshot) => json(StatusCode::OK, &snapshot),
        None => error(StatusCode::NOT_FOUND, "Metrics disabled"),
    }
}

fn error(status: StatusCode, message: &str) -> Response<ResponseBody> {
    json(
        status,
        &ErrorBody {
            error_message: message,
        },
    )
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Response<ResponseBody> {
    match serde_json::to_vec(value) {
        Ok(body) => respond(status, Bytes::from(body)),
        Err(err) => {
            log::error!("failed to encode response body -> {err}");
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"errorMessage":"Internal error"}"#),
            )
        }
    }
}

fn respond(status: StatusCode, body: Bytes) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCheckStore;
    use crate::fingerprint::{ProbeHttpClient, ProbeHttpResponse, RequestError};
    use async_trait::async_trait;
    use http::HeaderMap;
    use http::header::SERVER;
    use http_body_util::BodyExt;
    use url::Url;

    struct CloudflareClient;

    #[async_trait]
    impl ProbeHttpClient for CloudflareClient {
        async fn fetch_headers(&self, url: &Url) -> Result<ProbeHttpResponse, RequestError> {
            if url.host_str() == Some("down.example") {
                return Err(RequestError::transport(url, "connection refused"));
            }
            let mut headers = HeaderMap::new();
            headers.insert(SERVER, HeaderValue::from_static("cloudflare"));
            Ok(ProbeHttpResponse {
                status: 403,
                headers,
                url: url.clone(),
            })
        }
    }

    fn checker() -> Arc<HostChecker> {
        Arc::new(
            HostChecker::builder()
                .with_store(Arc::new(MemoryCheckStore::new()))
                .with_probe_client(Arc::new(CloudflareClient))
                .build()
                .unwrap(),
        )
    }

    async fn call(method: Method, uri: &str) -> (StatusCode, HeaderMap, serde_json::Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap();
        let response = handle(checker(), req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn single_returns_accepted_with_result() {
        let (status, headers, body) =
            call(Method::GET, "/single?url=https%3A%2F%2Fwww.example.com%2F").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(body["serverHeader"], true);
        assert_eq!(body["duidCookie"], false);
        assert!(body["time"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn missing_or_empty_url_is_bad_request() {
        for uri in ["/single", "/single?url=", "/single?other=1"] {
            let (status, headers, body) = call(Method::GET, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
            assert_eq!(body["errorMessage"], "No URL query parameter");
        }
    }

    #[tokio::test]
    async fn unparseable_url_is_server_error() {
        let (status, _, body) = call(Method::GET, "/single?url=not%20a%20url").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["errorMessage"], "Could not parse URL");
    }

    #[tokio::test]
    async fn probe_failure_reports_cause() {
        let (status, _, body) = call(Method::GET, "/single?url=https://down.example/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = body["errorMessage"].as_str().unwrap();
        assert!(message.contains("connection refused"), "{message}");
    }

    #[tokio::test]
    async fn stats_and_unknown_routes() {
        let (status, _, body) = call(Method::GET, "/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["probes"], 0);

        let (status, _, body) = call(Method::GET, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errorMessage"], "Not found");

        let (status, _, _) = call(Method::POST, "/single?url=https://example.com").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
