//! High level check orchestration.
//!
//! Wires together the probe client, the check cache and the event
//! subsystem, and applies the freshness policy that decides between a
//! cached result and a live probe.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinSet;
use url::Url;

use crate::cache::{CheckCache, CheckStore, MemoryCheckStore};
use crate::config::{DEFAULT_FRESHNESS_WINDOW, ServiceConfig};
use crate::fingerprint::{
	CheckResult, DEFAULT_PROBE_TIMEOUT, DEFAULT_USER_AGENT, ProbeHttpClient, ReqwestProbeHttpClient,
	RequestError, probe,
};
use crate::modules::events::{
	CacheErrorEvent, CacheHitEvent, CacheMissEvent, CacheOperation, CheckEvent, EventDispatcher,
	EventHandler, LoggingHandler, MetricsHandler, ProbeEvent, ProbeFailedEvent,
};
use crate::modules::metrics::{MetricsCollector, MetricsSnapshot};

/// Result alias used across the orchestration layer.
pub type HostCheckResult<T> = Result<T, HostCheckError>;

/// The caller's target could not be used.
#[derive(Debug, Error)]
pub enum InvalidInputError {
	#[error("No URL query parameter")]
	MissingUrl,
	#[error("Could not parse URL")]
	Unparseable(#[source] url::ParseError),
	#[error("Could not parse URL")]
	MissingHost,
}

/// Errors surfaced by [`HostChecker::check_host`]. Cache failures never
/// appear here.
#[derive(Debug, Error)]
pub enum HostCheckError {
	#[error(transparent)]
	InvalidInput(#[from] InvalidInputError),
	#[error(transparent)]
	Request(#[from] RequestError),
}

/// Parse the target and extract its hostname.
pub fn parse_target(raw: &str) -> Result<(Url, String), InvalidInputError> {
	let raw = raw.trim();
	if raw.is_empty() {
		return Err(InvalidInputError::MissingUrl);
	}
	let url = Url::parse(raw).map_err(InvalidInputError::Unparseable)?;
	let hostname = url
		.host_str()
		.filter(|host| !host.is_empty())
		.ok_or(InvalidInputError::MissingHost)?
		.to_string();
	Ok((url, hostname))
}

/// Freshness rule: an entry is fresh while its age is strictly below the
/// window. Age equal to the window is stale.
pub fn is_fresh(cached_time: i64, now: i64, window: Duration) -> bool {
	let window = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
	now.saturating_sub(cached_time) < window
}

/// Checker configuration used by the builder.
#[derive(Debug, Clone)]
pub struct HostCheckerConfig {
	pub freshness_window: Duration,
	pub probe_timeout: Duration,
	pub user_agent: String,
	pub enable_metrics: bool,
}

impl Default for HostCheckerConfig {
	fn default() -> Self {
		Self {
			freshness_window: DEFAULT_FRESHNESS_WINDOW,
			probe_timeout: DEFAULT_PROBE_TIMEOUT,
			user_agent: DEFAULT_USER_AGENT.to_string(),
			enable_metrics: true,
		}
	}
}

impl From<&ServiceConfig> for HostCheckerConfig {
	fn from(config: &ServiceConfig) -> Self {
		Self {
			freshness_window: config.freshness_window,
			probe_timeout: config.probe_timeout,
			user_agent: config.user_agent.clone(),
			enable_metrics: true,
		}
	}
}

/// Fluent builder for [`HostChecker`].
pub struct HostCheckerBuilder {
	config: HostCheckerConfig,
	store: Option<Arc<dyn CheckStore>>,
	probe_client: Option<Arc<dyn ProbeHttpClient>>,
	handlers: Vec<Arc<dyn EventHandler>>,
}

impl HostCheckerBuilder {
	pub fn new() -> Self {
		Self {
			config: HostCheckerConfig::default(),
			store: None,
			probe_client: None,
			handlers: Vec::new(),
		}
	}

	pub fn with_config(mut self, config: HostCheckerConfig) -> Self {
		self.config = config;
		self
	}

	pub fn with_freshness_window(mut self, window: Duration) -> Self {
		self.config.freshness_window = window;
		self
	}

	pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
		self.config.probe_timeout = timeout;
		self
	}

	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.config.user_agent = user_agent.into();
		self
	}

	/// Store holding the most recent check per hostname. Defaults to an
	/// in-memory store.
	pub fn with_store(mut self, store: Arc<dyn CheckStore>) -> Self {
		self.store = Some(store);
		self
	}

	/// Transport used for live probes. Defaults to reqwest with the
	/// configured timeout and user agent.
	pub fn with_probe_client(mut self, client: Arc<dyn ProbeHttpClient>) -> Self {
		self.probe_client = Some(client);
		self
	}

	pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
		self.handlers.push(handler);
		self
	}

	pub fn disable_metrics(mut self) -> Self {
		self.config.enable_metrics = false;
		self
	}

	pub fn build(self) -> HostCheckResult<HostChecker> {
		let probe_client = match self.probe_client {
			Some(client) => client,
			None => Arc::new(ReqwestProbeHttpClient::new(
				self.config.probe_timeout,
				&self.config.user_agent,
			)?),
		};
		let store = self
			.store
			.unwrap_or_else(|| Arc::new(MemoryCheckStore::new()));
		let metrics = self.config.enable_metrics.then(MetricsCollector::new);

		let mut events = EventDispatcher::new();
		events.register_handler(Arc::new(LoggingHandler));
		if let Some(ref collector) = metrics {
			events.register_handler(Arc::new(MetricsHandler::new(collector.clone())));
		}
		for handler in self.handlers {
			events.register_handler(handler);
		}

		Ok(HostChecker {
			config: self.config,
			probe_client,
			cache: CheckCache::new(store),
			metrics,
			events: Arc::new(events),
			pending_writes: Mutex::new(JoinSet::new()),
		})
	}
}

impl Default for HostCheckerBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Main check orchestrator, shared by every concurrent request.
pub struct HostChecker {
	config: HostCheckerConfig,
	probe_client: Arc<dyn ProbeHttpClient>,
	cache: CheckCache,
	metrics: Option<MetricsCollector>,
	events: Arc<EventDispatcher>,
	pending_writes: Mutex<JoinSet<()>>,
}

impl HostChecker {
	/// Obtain a builder to customise the checker instance.
	pub fn builder() -> HostCheckerBuilder {
		HostCheckerBuilder::new()
	}

	pub fn config(&self) -> &HostCheckerConfig {
		&self.config
	}

	pub fn cache(&self) -> &CheckCache {
		&self.cache
	}

	pub fn metrics(&self) -> Option<MetricsSnapshot> {
		self.metrics.as_ref().map(MetricsCollector::snapshot)
	}

	/// Return a fresh cached result for the target's host, or probe it.
	///
	/// Cache failures degrade to a probe and are only logged. Probe failures
	/// are returned even when a stale entry exists. A successful probe is
	/// persisted on a background task after this returns.
	pub async fn check_host(&self, url: &str) -> HostCheckResult<CheckResult> {
		let (target, hostname) = parse_target(url)?;

		match self.cache.get(&hostname).await {
			Ok(Some(cached)) => {
				let now = Utc::now().timestamp();
				let age = now.saturating_sub(cached.time);
				if is_fresh(cached.time, now, self.config.freshness_window) {
					self.events.dispatch(CheckEvent::CacheHit(CacheHitEvent {
						hostname,
						age_secs: age,
						timestamp: Utc::now(),
					}));
					return Ok(cached);
				}
				self.events.dispatch(CheckEvent::CacheMiss(CacheMissEvent {
					hostname: hostname.clone(),
					stale_age_secs: Some(age),
					timestamp: Utc::now(),
				}));
			}
			Ok(None) => {
				self.events.dispatch(CheckEvent::CacheMiss(CacheMissEvent {
					hostname: hostname.clone(),
					stale_age_secs: None,
					timestamp: Utc::now(),
				}));
			}
			Err(err) => {
				self.events.dispatch(CheckEvent::CacheError(CacheErrorEvent {
					hostname: hostname.clone(),
					operation: CacheOperation::Read,
					error: err.to_string(),
					timestamp: Utc::now(),
				}));
			}
		}

		let result = match probe(self.probe_client.as_ref(), &target).await {
			Ok(result) => result,
			Err(err) => {
				self.events.dispatch(CheckEvent::ProbeFailed(ProbeFailedEvent {
					hostname,
					url: target.to_string(),
					error: err.to_string(),
					timestamp: Utc::now(),
				}));
				return Err(err.into());
			}
		};

		self.events.dispatch(CheckEvent::Probe(ProbeEvent {
			hostname: hostname.clone(),
			url: target.to_string(),
			latency: Duration::from_micros(u64::try_from(result.response_time).unwrap_or(0)),
			result,
			timestamp: Utc::now(),
		}));

		self.persist(hostname, result);
		Ok(result)
	}

	/// Wait for every background cache write started so far.
	pub async fn flush(&self) {
		let mut writes = std::mem::take(&mut *self.lock_pending_writes());
		while let Some(joined) = writes.join_next().await {
			if let Err(err) = joined {
				log::warn!("cache write task failed -> {err}");
			}
		}
	}

	/// Number of background cache writes not yet reaped.
	pub fn pending_writes(&self) -> usize {
		self.lock_pending_writes().len()
	}

	fn lock_pending_writes(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
		self.pending_writes
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Best-effort background write; failures are reported as events.
	fn persist(&self, hostname: String, result: CheckResult) {
		let cache = self.cache.clone();
		let events = self.events.clone();
		let mut writes = self.lock_pending_writes();
		while writes.try_join_next().is_some() {}
		writes.spawn(async move {
			if let Err(err) = cache.put(&hostname, &result).await {
				events.dispatch(CheckEvent::CacheError(CacheErrorEvent {
					hostname,
					operation: CacheOperation::Write,
					error: err.to_string(),
					timestamp: Utc::now(),
				}));
			}
		});
	}
}
