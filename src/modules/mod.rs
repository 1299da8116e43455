//! Cross-cutting services module
//!
//! Observability around host checks: typed events, logging and in-memory
//! metrics.

pub mod events;
pub mod metrics;

// Re-export commonly used types
pub use events::{
    CacheErrorEvent, CacheHitEvent, CacheMissEvent, CacheOperation, CheckEvent, EventDispatcher,
    EventHandler, LoggingHandler, MetricsHandler, ProbeEvent, ProbeFailedEvent,
};
pub use metrics::{MetricsCollector, MetricsSnapshot};
