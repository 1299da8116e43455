//! Fingerprint extraction from probed responses.
//!
//! Cookie markers are matched as plain substrings of the raw `Set-Cookie`
//! text, so a marker embedded in an unrelated cookie value also counts.

use chrono::Utc;
use http::HeaderMap;
use http::header::{SERVER, SET_COOKIE};

use super::types::{CheckResult, ProbeResponse};

/// Exact `Server` header value sent by Cloudflare edges.
pub const CLOUDFLARE_SERVER: &str = "cloudflare";

pub const DUID_COOKIE_MARKER: &str = "__cfduid=";
pub const LOAD_BALANCER_COOKIE_MARKER: &str = "__cflb=";
pub const BOT_MANAGEMENT_COOKIE_MARKER: &str = "__cf_bm=";
pub const OFFLINE_BROWSING_INFO_COOKIE_MARKER: &str = "cf_ob_info=";
pub const USE_OFFLINE_BROWSING_COOKIE_MARKER: &str = "cf_use_ob=";

/// Build a [`CheckResult`] from the response headers, stamped with the
/// current time. `response_time` is left at zero for the probe to fill in.
///
/// The status code does not take part: challenge and error pages served by
/// Cloudflare carry the same markers as successful responses.
pub fn classify(response: &ProbeResponse<'_>) -> CheckResult {
    let result = classify_headers(response.headers, Utc::now().timestamp());
    log::debug!(
        "classified {} (status {}) markers={:?}",
        response.url,
        response.status,
        result.detected_markers()
    );
    result
}

/// Time-injected variant of [`classify`].
pub fn classify_headers(headers: &HeaderMap, time: i64) -> CheckResult {
    let mut result = CheckResult::at(time);
    result.server_header = has_cloudflare_server(headers);

    let cookies = set_cookie_text(headers);
    if !cookies.is_empty() {
        result.duid_cookie = cookies.contains(DUID_COOKIE_MARKER);
        result.load_balancer_cookie = cookies.contains(LOAD_BALANCER_COOKIE_MARKER);
        result.bot_management_cookie = cookies.contains(BOT_MANAGEMENT_COOKIE_MARKER);
        result.offline_browsing_info_cookie =
            cookies.contains(OFFLINE_BROWSING_INFO_COOKIE_MARKER);
        result.use_offline_browsing_cookie = cookies.contains(USE_OFFLINE_BROWSING_COOKIE_MARKER);
    }

    result
}

/// Case-sensitive exact match on the first `Server` header.
pub fn has_cloudflare_server(headers: &HeaderMap) -> bool {
    headers
        .get(SERVER)
        .map(|value| value.as_bytes() == CLOUDFLARE_SERVER.as_bytes())
        .unwrap_or(false)
}

/// All `Set-Cookie` lines joined by newlines.
///
/// Header values cannot contain a newline, so joining never forms a marker
/// that spans two lines.
pub fn set_cookie_text(headers: &HeaderMap) -> String {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}
