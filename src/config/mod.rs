//! Settings and configuration module
//!
//! Service settings come from `CFCHECK_*` environment variables (a `.env`
//! file is loaded by the binary first). Anything unset falls back to the
//! defaults below.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use http::HeaderValue;
use thiserror::Error;

use crate::fingerprint::{DEFAULT_PROBE_TIMEOUT, DEFAULT_USER_AGENT};

pub const ENV_BIND_ADDR: &str = "CFCHECK_BIND_ADDR";
pub const ENV_STORE: &str = "CFCHECK_STORE";
pub const ENV_STORE_PATH: &str = "CFCHECK_STORE_PATH";
pub const ENV_FRESHNESS_SECS: &str = "CFCHECK_FRESHNESS_SECS";
pub const ENV_PROBE_TIMEOUT_SECS: &str = "CFCHECK_PROBE_TIMEOUT_SECS";
pub const ENV_USER_AGENT: &str = "CFCHECK_USER_AGENT";

/// How long a cached check is served before a new probe: one hour.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(60 * 60);

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_STORE_PATH: &str = "cfcheck.redb";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: {value:?}")]
    InvalidAddress { var: &'static str, value: String },
    #[error("{var} must be a whole number of seconds: {value:?}")]
    InvalidSeconds { var: &'static str, value: String },
    #[error("{var} must be greater than zero")]
    ZeroDuration { var: &'static str },
    #[error("{var} must be `redb` or `memory`, got {value:?}")]
    UnknownStore { var: &'static str, value: String },
    #[error("{var} is not a valid header value: {value:?}")]
    InvalidUserAgent { var: &'static str, value: String },
}

/// Which [`CheckStore`](crate::cache::CheckStore) backs the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Redb { path: PathBuf },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreBackend,
    pub freshness_window: Duration,
    pub probe_timeout: Duration,
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            store: StoreBackend::Redb {
                path: PathBuf::from(DEFAULT_STORE_PATH),
            },
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bind_addr = get(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse()
            .map_err(|_| ConfigError::InvalidAddress {
                var: ENV_BIND_ADDR,
                value: bind_addr.clone(),
            })?;

        let store = match get(ENV_STORE).as_deref() {
            None | Some("redb") => StoreBackend::Redb {
                path: get(ENV_STORE_PATH)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
            },
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::UnknownStore {
                    var: ENV_STORE,
                    value: other.to_string(),
                });
            }
        };

        let freshness_window = seconds(ENV_FRESHNESS_SECS, get(ENV_FRESHNESS_SECS))?
            .unwrap_or(DEFAULT_FRESHNESS_WINDOW);
        let probe_timeout = seconds(ENV_PROBE_TIMEOUT_SECS, get(ENV_PROBE_TIMEOUT_SECS))?
            .unwrap_or(DEFAULT_PROBE_TIMEOUT);
        let user_agent = get(ENV_USER_AGENT).unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        if HeaderValue::from_str(&user_agent).is_err() {
            return Err(ConfigError::InvalidUserAgent {
                var: ENV_USER_AGENT,
                value: user_agent,
            });
        }

        Ok(Self {
            bind_addr,
            store,
            freshness_window,
            probe_timeout,
            user_agent,
        })
    }
}

fn seconds(var: &'static str, raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let secs: u64 = raw
        .parse()
        .map_err(|_| ConfigError::InvalidSeconds { var, value: raw.clone() })?;
    if secs == 0 {
        return Err(ConfigError::ZeroDuration { var });
    }
    Ok(Some(Duration::from_secs(secs)))
}
