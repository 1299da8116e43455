//! Metrics collection utilities.
//!
//! Process-lifetime counters for cache and probe activity plus probe latency
//! percentiles. Nothing here is persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::events::CacheOperation;

/// Point-in-time view of the collected metrics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub started_at: DateTime<Utc>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_read_errors: u64,
    pub cache_write_errors: u64,
    pub probes: u64,
    pub probe_failures: u64,
    pub cloudflare_detections: u64,
    pub average_probe_latency_ms: Option<f64>,
    pub p95_probe_latency_ms: Option<f64>,
}

#[derive(Debug)]
struct MetricsState {
    started_at: DateTime<Utc>,
    cache_hits: u64,
    cache_misses: u64,
    cache_read_errors: u64,
    cache_write_errors: u64,
    probes: u64,
    probe_failures: u64,
    cloudflare_detections: u64,
    latencies: VecDeque<Duration>,
    max_window: usize,
}

impl MetricsState {
    fn new(max_window: usize) -> Self {
        Self {
            started_at: Utc::now(),
            cache_hits: 0,
            cache_misses: 0,
            cache_read_errors: 0,
            cache_write_errors: 0,
            probes: 0,
            probe_failures: 0,
            cloudflare_detections: 0,
            latencies: VecDeque::with_capacity(max_window),
            max_window,
        }
    }

    fn latency_stats(&self) -> (Option<Duration>, Option<Duration>) {
        if self.latencies.is_empty() {
            return (None, None);
        }
        let mut samples: Vec<_> = self.latencies.iter().cloned().collect();
        samples.sort_unstable();
        let avg = samples
            .iter()
            .map(|d| d.as_secs_f64())
            .sum::<f64>()
            / samples.len() as f64;
        let p95_index = ((samples.len() as f64 * 0.95).ceil() as usize).saturating_sub(1);
        let p95 = samples[p95_index];
        (Some(Duration::from_secs_f64(avg)), Some(p95))
    }
}

/// Thread-safe metrics collector shared by the checker and the server.
#[derive(Clone, Debug)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsState::new(128))),
        }
    }

    pub fn with_window(window: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsState::new(window.max(16)))),
        }
    }

    fn update(&self, f: impl FnOnce(&mut MetricsState)) {
        if let Ok(mut guard) = self.inner.lock() {
            f(&mut guard);
        }
    }

    pub fn record_cache_hit(&self) {
        self.update(|state| state.cache_hits += 1);
    }

    pub fn record_cache_miss(&self) {
        self.update(|state| state.cache_misses += 1);
    }

    pub fn record_cache_error(&self, operation: CacheOperation) {
        self.update(|state| match operation {
            CacheOperation::Read => state.cache_read_errors += 1,
            CacheOperation::Write => state.cache_write_errors += 1,
        });
    }

    pub fn record_probe(&self, latency: Duration, cloudflare: bool) {
        self.update(|state| {
            state.probes += 1;
            if cloudflare {
                state.cloudflare_detections += 1;
            }
            if state.latencies.len() == state.max_window {
                state.latencies.pop_front();
            }
            state.latencies.push_back(latency);
        });
    }

    pub fn record_probe_failure(&self) {
        self.update(|state| state.probe_failures += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (avg, p95) = guard.latency_stats();
        let millis = |d: Duration| d.as_secs_f64() * 1000.0;
        MetricsSnapshot {
            started_at: guard.started_at,
            cache_hits: guard.cache_hits,
            cache_misses: guard.cache_misses,
            cache_read_errors: guard.cache_read_errors,
            cache_write_errors: guard.cache_write_errors,
            probes: guard.probes,
            probe_failures: guard.probe_failures,
            cloudflare_detections: guard.cloudflare_detections,
            average_probe_latency_ms: avg.map(millis),
            p95_probe_latency_ms: p95.map(millis),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn records_probes_and_failures() {
        let metrics = MetricsCollector::new();
        metrics.record_probe(Duration::from_millis(100), true);
        metrics.record_probe(Duration::from_millis(300), false);
        metrics.record_probe_failure();
        metrics.record_cache_miss();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.probes, 2);
        assert_eq!(snapshot.cloudflare_detections, 1);
        assert_eq!(snapshot.probe_failures, 1);
        assert_eq!(snapshot.cache_misses, 1);
        let avg = snapshot.average_probe_latency_ms.unwrap();
        assert!((avg - 200.0).abs() < 0.001);
        assert!((snapshot.p95_probe_latency_ms.unwrap() - 300.0).abs() < 0.001);
    }

    #[test]
    fn latency_window_is_bounded() {
        let metrics = MetricsCollector::with_window(16);
        for _ in 0..16 {
            metrics.record_probe(Duration::from_millis(900), false);
        }
        for _ in 0..16 {
            metrics.record_probe(Duration::from_millis(10), false);
        }
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.probes, 32);
        assert!((snapshot.p95_probe_latency_ms.unwrap() - 10.0).abs() < 0.001);
    }
}
