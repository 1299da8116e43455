//! Event system for host checks.
//!
//! Provides hooks for metrics, logging, and custom reactions around cache
//! and probe activity.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::metrics::MetricsCollector;
use crate::fingerprint::CheckResult;

/// A cached result was fresh enough to serve.
#[derive(Debug, Clone)]
pub struct CacheHitEvent {
    pub hostname: String,
    pub age_secs: i64,
    pub timestamp: DateTime<Utc>,
}

/// No usable cached result; a probe follows.
#[derive(Debug, Clone)]
pub struct CacheMissEvent {
    pub hostname: String,
    /// Age of a stale entry, `None` when nothing was cached.
    pub stale_age_secs: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

/// The store failed; recovered locally.
#[derive(Debug, Clone)]
pub struct CacheErrorEvent {
    pub hostname: String,
    pub operation: CacheOperation,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOperation {
    Read,
    Write,
}

/// A live probe completed.
#[derive(Debug, Clone)]
pub struct ProbeEvent {
    pub hostname: String,
    pub url: String,
    pub latency: Duration,
    pub result: CheckResult,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProbeFailedEvent {
    pub hostname: String,
    pub url: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum CheckEvent {
    CacheHit(CacheHitEvent),
    CacheMiss(CacheMissEvent),
    CacheError(CacheErrorEvent),
    Probe(ProbeEvent),
    ProbeFailed(ProbeFailedEvent),
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &CheckEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: CheckEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &CheckEvent) {
        match event {
            CheckEvent::CacheHit(hit) => {
                log::debug!("cache hit {} (age {}s)", hit.hostname, hit.age_secs);
            }
            CheckEvent::CacheMiss(miss) => match miss.stale_age_secs {
                Some(age) => log::debug!("cache stale {} (age {}s)", miss.hostname, age),
                None => log::debug!("cache miss {}", miss.hostname),
            },
            CheckEvent::CacheError(error) => {
                let op = match error.operation {
                    CacheOperation::Read => "read",
                    CacheOperation::Write => "write",
                };
                log::warn!("cache {} failed for {} -> {}", op, error.hostname, error.error);
            }
            CheckEvent::Probe(probe) => {
                log::info!(
                    "probed {} in {:.2}ms cloudflare={} markers={:?}",
                    probe.url,
                    probe.latency.as_secs_f64() * 1000.0,
                    probe.result.is_cloudflare(),
                    probe.result.detected_markers()
                );
            }
            CheckEvent::ProbeFailed(failed) => {
                log::warn!("probe {} failed -> {}", failed.url, failed.error);
            }
        }
    }
}

/// Metrics handler that feeds the metrics collector.
#[derive(Clone, Debug)]
pub struct MetricsHandler {
    metrics: MetricsCollector,
}

impl MetricsHandler {
    pub fn new(metrics: MetricsCollector) -> Self {
        Self { metrics }
    }
}

impl EventHandler for MetricsHandler {
    fn handle(&self, event: &CheckEvent) {
        match event {
            CheckEvent::CacheHit(_) => self.metrics.record_cache_hit(),
            CheckEvent::CacheMiss(_) => self.metrics.record_cache_miss(),
            CheckEvent::CacheError(error) => self.metrics.record_cache_error(error.operation),
            CheckEvent::Probe(probe) => {
                self.metrics
                    .record_probe(probe.latency, probe.result.is_cloudflare());
            }
            CheckEvent::ProbeFailed(_) => self.metrics.record_probe_failure(),
        }
    }
}
