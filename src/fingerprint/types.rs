//! Core data structures shared by the classifier, the probe and the cache.

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use url::Url;

/// Outcome of a single fingerprint check.
///
/// Serialized with the camelCase field names exposed by the HTTP endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// Unix timestamp (seconds) of the check.
    pub time: i64,
    /// Microseconds from request start until response headers arrived.
    pub response_time: i64,

    /// `Server: cloudflare`
    pub server_header: bool,
    // See https://developers.cloudflare.com/fundamentals/reference/policies-compliances/cloudflare-cookies/
    /// `__cfduid`
    pub duid_cookie: bool,
    /// `__cflb`
    pub load_balancer_cookie: bool,
    /// `__cf_bm`
    pub bot_management_cookie: bool,
    /// `cf_ob_info`
    pub offline_browsing_info_cookie: bool,
    /// `cf_use_ob`
    pub use_offline_browsing_cookie: bool,
}

impl CheckResult {
    /// Empty result stamped with the given time.
    pub fn at(time: i64) -> Self {
        Self {
            time,
            ..Self::default()
        }
    }

    pub fn with_response_time(mut self, micros: i64) -> Self {
        self.response_time = micros;
        self
    }

    /// True when any Cloudflare marker was found.
    pub fn is_cloudflare(&self) -> bool {
        self.server_header
            || self.duid_cookie
            || self.load_balancer_cookie
            || self.bot_management_cookie
            || self.offline_browsing_info_cookie
            || self.use_offline_browsing_cookie
    }

    /// Names of the markers that were detected, in field order.
    pub fn detected_markers(&self) -> Vec<&'static str> {
        [
            (self.server_header, "serverHeader"),
            (self.duid_cookie, "duidCookie"),
            (self.load_balancer_cookie, "loadBalancerCookie"),
            (self.bot_management_cookie, "botManagementCookie"),
            (self.offline_browsing_info_cookie, "offlineBrowsingInfoCookie"),
            (self.use_offline_browsing_cookie, "useOfflineBrowsingCookie"),
        ]
        .into_iter()
        .filter_map(|(hit, name)| hit.then_some(name))
        .collect()
    }
}

/// Minimal view of a probed HTTP response handed to the classifier.
#[derive(Debug, Clone)]
pub struct ProbeResponse<'a> {
    pub url: &'a Url,
    pub status: u16,
    pub headers: &'a HeaderMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_endpoint_field_names() {
        let result = CheckResult {
            time: 1_700_000_000,
            response_time: 1234,
            server_header: true,
            bot_management_cookie: true,
            ..CheckResult::default()
        };

        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["time"], 1_700_000_000);
        assert_eq!(json["responseTime"], 1234);
        assert_eq!(json["serverHeader"], true);
        assert_eq!(json["duidCookie"], false);
        assert_eq!(json["loadBalancerCookie"], false);
        assert_eq!(json["botManagementCookie"], true);
        assert_eq!(json["offlineBrowsingInfoCookie"], false);
        assert_eq!(json["useOfflineBrowsingCookie"], false);
        assert_eq!(json.as_object().unwrap().len(), 8);
    }

    #[test]
    fn lists_detected_markers() {
        let mut result = CheckResult::at(1);
        assert!(!result.is_cloudflare());
        assert!(result.detected_markers().is_empty());

        result.load_balancer_cookie = true;
        result.use_offline_browsing_cookie = true;
        assert!(result.is_cloudflare());
        assert_eq!(
            result.detected_markers(),
            vec!["loadBalancerCookie", "useOfflineBrowsingCookie"]
        );
    }
}
