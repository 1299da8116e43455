//! Most-recent check per hostname.
//!
//! Each [`CheckResult`] is stored as a flat field map under
//! `previous-check:hostname#<hostname>`. Booleans are written as `"1"` /
//! `"0"` and only `"1"` reads back as true. Entries never expire at the
//! store level; freshness is decided by the caller.

pub mod redb_store;
pub mod store;

use std::sync::Arc;

use thiserror::Error;

use crate::fingerprint::CheckResult;

pub use redb_store::RedbCheckStore;
pub use store::{CheckStore, FieldMap, MemoryCheckStore, StoreError};

const KEY_PREFIX: &str = "previous-check:hostname#";

pub const FIELD_TIME: &str = "time";
pub const FIELD_RESPONSE_TIME: &str = "response-time";
pub const FIELD_SERVER_HEADER: &str = "server-header";
pub const FIELD_DUID_COOKIE: &str = "duid-cookie";
pub const FIELD_LOAD_BALANCER_COOKIE: &str = "load-balancer-cookie";
pub const FIELD_BOT_MANAGEMENT_COOKIE: &str = "bot-management-cookie";
pub const FIELD_OFFLINE_BROWSING_INFO_COOKIE: &str = "offline-browsing-info-cookie";
pub const FIELD_USE_OFFLINE_BROWSING_COOKIE: &str = "use-offline-browsing-cookie";

/// Store key for a hostname. The hostname is used as given.
pub fn entry_key(hostname: &str) -> String {
    format!("{KEY_PREFIX}{hostname}")
}

#[derive(Debug, Error)]
pub enum CacheReadError {
    #[error("cache read failed: {0}")]
    Store(#[from] StoreError),
    #[error("malformed cache field {field}: {value:?}")]
    Malformed { field: &'static str, value: String },
}

#[derive(Debug, Error)]
#[error("cache write failed: {0}")]
pub struct CacheWriteError(#[from] pub StoreError);

impl From<&CheckResult> for FieldMap {
    fn from(result: &CheckResult) -> Self {
        let flag = |value: bool| (if value { "1" } else { "0" }).to_string();
        FieldMap::from([
            (FIELD_TIME.to_string(), result.time.to_string()),
            (FIELD_RESPONSE_TIME.to_string(), result.response_time.to_string()),
            (FIELD_SERVER_HEADER.to_string(), flag(result.server_header)),
            (FIELD_DUID_COOKIE.to_string(), flag(result.duid_cookie)),
            (
                FIELD_LOAD_BALANCER_COOKIE.to_string(),
                flag(result.load_balancer_cookie),
            ),
            (
                FIELD_BOT_MANAGEMENT_COOKIE.to_string(),
                flag(result.bot_management_cookie),
            ),
            (
                FIELD_OFFLINE_BROWSING_INFO_COOKIE.to_string(),
                flag(result.offline_browsing_info_cookie),
            ),
            (
                FIELD_USE_OFFLINE_BROWSING_COOKIE.to_string(),
                flag(result.use_offline_browsing_cookie),
            ),
        ])
    }
}

/// Decode a stored entry. `Ok(None)` when the entry has no `time` field.
pub fn decode_fields(fields: &FieldMap) -> Result<Option<CheckResult>, CacheReadError> {
    let Some(time) = fields.get(FIELD_TIME) else {
        return Ok(None);
    };

    let time = parse_integer(FIELD_TIME, time)?;
    let response_time = match fields.get(FIELD_RESPONSE_TIME) {
        Some(raw) => parse_integer(FIELD_RESPONSE_TIME, raw)?,
        None => 0,
    };
    let flag = |name: &str| fields.get(name).is_some_and(|value| value == "1");

    Ok(Some(CheckResult {
        time,
        response_time,
        server_header: flag(FIELD_SERVER_HEADER),
        duid_cookie: flag(FIELD_DUID_COOKIE),
        load_balancer_cookie: flag(FIELD_LOAD_BALANCER_COOKIE),
        bot_management_cookie: flag(FIELD_BOT_MANAGEMENT_COOKIE),
        offline_browsing_info_cookie: flag(FIELD_OFFLINE_BROWSING_INFO_COOKIE),
        use_offline_browsing_cookie: flag(FIELD_USE_OFFLINE_BROWSING_COOKIE),
    }))
}

fn parse_integer(field: &'static str, raw: &str) -> Result<i64, CacheReadError> {
    raw.trim().parse().map_err(|_| CacheReadError::Malformed {
        field,
        value: raw.to_string(),
    })
}

/// Typed front of a [`CheckStore`]. Cheap to clone.
#[derive(Clone)]
pub struct CheckCache {
    store: Arc<dyn CheckStore>,
}

impl CheckCache {
    pub fn new(store: Arc<dyn CheckStore>) -> Self {
        Self { store }
    }

    /// Last stored result for `hostname`, if any.
    pub async fn get(&self, hostname: &str) -> Result<Option<CheckResult>, CacheReadError> {
        let fields = self.store.read_entry(&entry_key(hostname)).await?;
        decode_fields(&fields)
    }

    /// Replace the stored result for `hostname`.
    pub async fn put(&self, hostname: &str, result: &CheckResult) -> Result<(), CacheWriteError> {
        self.store
            .write_entry(&entry_key(hostname), &FieldMap::from(result))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CheckResult {
        CheckResult {
            time: 1_650_000_000,
            response_time: 48_213,
            server_header: true,
            duid_cookie: false,
            load_balancer_cookie: true,
            bot_management_cookie: false,
            offline_browsing_info_cookie: true,
            use_offline_browsing_cookie: false,
        }
    }

    #[test]
    fn keys_use_hostname_verbatim() {
        assert_eq!(entry_key("Example.COM"), "previous-check:hostname#Example.COM");
    }

    #[test]
    fn encodes_booleans_as_bits() {
        let fields = FieldMap::from(&sample());
        assert_eq!(fields.len(), 8);
        assert_eq!(fields[FIELD_TIME], "1650000000");
        assert_eq!(fields[FIELD_RESPONSE_TIME], "48213");
        assert_eq!(fields[FIELD_SERVER_HEADER], "1");
        assert_eq!(fields[FIELD_DUID_COOKIE], "0");
    }

    #[test]
    fn only_literal_one_is_true() {
        let mut fields = FieldMap::new();
        fields.insert(FIELD_TIME.into(), "10".into());
        fields.insert(FIELD_SERVER_HEADER.into(), "true".into());
        fields.insert(FIELD_DUID_COOKIE.into(), "1".into());
        fields.insert(FIELD_LOAD_BALANCER_COOKIE.into(), "0".into());

        let result = decode_fields(&fields).unwrap().unwrap();
        assert!(!result.server_header);
        assert!(result.duid_cookie);
        assert!(!result.load_balancer_cookie);
        assert!(!result.bot_management_cookie);
        assert_eq!(result.response_time, 0);
    }

    #[test]
    fn entry_without_time_is_absent() {
        let mut fields = FieldMap::new();
        fields.insert(FIELD_SERVER_HEADER.into(), "1".into());
        assert!(decode_fields(&fields).unwrap().is_none());
        assert!(decode_fields(&FieldMap::new()).unwrap().is_none());
    }

    #[test]
    fn non_numeric_time_is_malformed() {
        let mut fields = FieldMap::new();
        fields.insert(FIELD_TIME.into(), "yesterday".into());
        let err = decode_fields(&fields).unwrap_err();
        assert!(matches!(err, CacheReadError::Malformed { field: FIELD_TIME, .. }));
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = CheckCache::new(Arc::new(MemoryCheckStore::new()));
        assert!(cache.get("example.com").await.unwrap().is_none());

        cache.put("example.com", &sample()).await.unwrap();
        assert_eq!(cache.get("example.com").await.unwrap(), Some(sample()));

        let newer = CheckResult::at(1_650_000_500);
        cache.put("example.com", &newer).await.unwrap();
        assert_eq!(cache.get("example.com").await.unwrap(), Some(newer));
    }

    #[tokio::test]
    async fn round_trips_through_redb() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbCheckStore::open(dir.path().join("cache.redb")).unwrap();
        let cache = CheckCache::new(Arc::new(store));

        cache.put("cdn.example.org", &sample()).await.unwrap();
        assert_eq!(cache.get("cdn.example.org").await.unwrap(), Some(sample()));
        assert!(cache.get("other.example.org").await.unwrap().is_none());
    }
}
