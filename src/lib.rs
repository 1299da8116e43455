//! # cfcheck
//!
//! Tells whether a website sits behind Cloudflare by looking at the
//! response headers of a single live request, and remembers the answer per
//! hostname for a configurable freshness window.
//!
//! ## Features
//!
//! - One-shot async probes with a bounded timeout
//! - Detection of the Cloudflare `Server` header and the `__cfduid`,
//!   `__cflb`, `__cf_bm`, `cf_ob_info` and `cf_use_ob` cookies
//! - Per-hostname cache backed by redb or memory, written in the background
//! - Cache failures degrade to live probes instead of failing the request
//! - Small JSON HTTP endpoint with in-process metrics
//!
//! ## Example
//!
//! ```no_run
//! use cfcheck::HostChecker;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let checker = HostChecker::builder().build()?;
//!     let result = checker.check_host("https://www.cloudflare.com/").await?;
//!     println!("cloudflare: {}", result.is_cloudflare());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod checker;
pub mod config;
pub mod fingerprint;
pub mod modules;
pub mod server;

pub use crate::checker::{
    HostCheckError,
    HostCheckResult,
    HostChecker,
    HostCheckerBuilder,
    HostCheckerConfig,
    InvalidInputError,
    is_fresh,
    parse_target,
};

pub use crate::cache::{
    CacheReadError,
    CacheWriteError,
    CheckCache,
    CheckStore,
    FieldMap,
    MemoryCheckStore,
    RedbCheckStore,
    StoreError,
    entry_key,
};

pub use crate::config::{ConfigError, DEFAULT_FRESHNESS_WINDOW, ServiceConfig, StoreBackend};

pub use crate::fingerprint::{
    CheckResult,
    ProbeHttpClient,
    ProbeHttpResponse,
    ProbeResponse,
    ReqwestProbeHttpClient,
    RequestError,
    classify,
    probe,
};

pub use crate::modules::{
    CheckEvent,
    EventDispatcher,
    EventHandler,
    LoggingHandler,
    MetricsCollector,
    MetricsHandler,
    MetricsSnapshot,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
