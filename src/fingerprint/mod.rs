//! Cloudflare fingerprinting: response classification and live probing.

pub mod analysis;
pub mod executor;
pub mod reqwest_client;
pub mod types;

pub use analysis::{classify, classify_headers, has_cloudflare_server, set_cookie_text};
pub use executor::{ProbeHttpClient, ProbeHttpResponse, RequestError, probe};
pub use reqwest_client::{DEFAULT_PROBE_TIMEOUT, DEFAULT_USER_AGENT, ReqwestProbeHttpClient};
pub use types::{CheckResult, ProbeResponse};
