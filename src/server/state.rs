//! Shared server state
//!
//! One explicit context object, passed to every component: the active
//! registry, the function inventory, and the routing cache all live
//! behind a single mutex, and the "first configuration received" gate is
//! a one-shot idempotent watch signal. The lock is only ever held for
//! in-memory work; telemetry network I/O happens outside it against a
//! snapshot of poll targets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, trace, warn};

use crate::registry::{HostRegistry, PollTarget};
use crate::routing::rebuild_cache;
use crate::telemetry::HostReading;

/// Everything guarded by the shared lock
#[derive(Debug, Default)]
pub struct RouterState {
    /// Active registry; `None` until the first configuration arrives
    pub registry: Option<HostRegistry>,
    /// Function inventory derived from the active registry
    pub functions: Vec<String>,
    /// Last computed best URL per function; absent means "not found".
    /// Kept across reloads so GET keeps answering until the next cycle.
    pub cache: HashMap<String, String>,
    /// When the cache was last rebuilt
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// Poll targets snapshotted under the lock for one refresh cycle
#[derive(Debug)]
pub struct PollSnapshot {
    pub targets: Vec<PollTarget>,
    pub generation: u64,
    pub refresh_interval: Duration,
}

/// Summary served by GET /status
#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub configured: bool,
    pub hosts: usize,
    pub cloud: bool,
    pub functions: usize,
    pub generation: u64,
    pub cached_routes: usize,
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Mutex<RouterState>>,
    configured: Arc<watch::Sender<bool>>,
    http: Client,
    next_generation: Arc<AtomicU64>,
}

impl AppState {
    /// Create the state with an HTTP client bounded by `poll_timeout` per
    /// telemetry request
    pub fn new(poll_timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(poll_timeout)
            .build()
            .expect("Failed to create HTTP client");

        let (configured, _) = watch::channel(false);

        Self {
            inner: Arc::new(Mutex::new(RouterState::default())),
            configured: Arc::new(configured),
            http,
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The shared HTTP client used for telemetry polls
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Whether a configuration has ever been accepted
    pub fn is_configured(&self) -> bool {
        *self.configured.borrow()
    }

    /// Flip the one-shot configured signal; safe to call repeatedly
    pub fn mark_configured(&self) {
        self.configured.send_replace(true);
    }

    /// Block until the first configuration has been accepted
    pub async fn wait_until_configured(&self) {
        let mut rx = self.configured.subscribe();
        // Err only if the sender dropped, which self keeps alive
        let _ = rx.wait_for(|configured| *configured).await;
    }

    /// Atomically swap in a new registry and recompute the function
    /// inventory. The routing cache is left in place: it keeps answering
    /// with its previous results until the next refresh cycle.
    pub async fn install_registry(&self, mut registry: HostRegistry) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        registry.generation = generation;
        let functions = registry.function_names();

        info!(
            hosts = registry.host_count(),
            cloud = registry.has_cloud(),
            functions = functions.len(),
            generation,
            "installing host registry"
        );

        let mut state = self.inner.lock().await;
        state.registry = Some(registry);
        state.functions = functions;
        generation
    }

    /// Snapshot the current poll targets, or `None` before the first
    /// configuration
    pub async fn poll_snapshot(&self) -> Option<PollSnapshot> {
        let state = self.inner.lock().await;
        let registry = state.registry.as_ref()?;
        Some(PollSnapshot {
            targets: registry.poll_targets(),
            generation: registry.generation,
            refresh_interval: registry.refresh_interval,
        })
    }

    /// Write one cycle's telemetry readings into the registry they were
    /// polled from. Returns `false` when the registry was replaced while
    /// the poll was in flight; the readings are discarded wholesale in
    /// that case.
    pub async fn apply_readings(&self, generation: u64, readings: Vec<HostReading>) -> bool {
        let mut state = self.inner.lock().await;
        let Some(registry) = state.registry.as_mut() else {
            return false;
        };
        if registry.generation != generation {
            debug!(
                polled = generation,
                active = registry.generation,
                "registry reloaded mid-poll; discarding readings"
            );
            return false;
        }

        for reading in readings {
            let Some(host) = registry.hosts.get_mut(reading.host_index) else {
                continue;
            };
            match reading.result {
                Ok((cpu, ram)) => {
                    trace!(host = %host.name, cpu, ram, "telemetry updated");
                    host.record_utilization(cpu, ram);
                }
                Err(error) => {
                    warn!(host = %host.name, %error, "telemetry poll failed; poisoning host");
                    host.poison();
                }
            }
        }
        true
    }

    /// Re-run the selector for every known function and swap the results
    /// into the routing cache
    pub async fn rebuild_routing_cache(&self) {
        let mut state = self.inner.lock().await;
        let RouterState {
            registry,
            functions,
            cache,
            last_refreshed,
        } = &mut *state;

        let Some(registry) = registry.as_mut() else {
            return;
        };

        *cache = rebuild_cache(registry, functions);
        *last_refreshed = Some(Utc::now());
        debug!(routes = cache.len(), of = functions.len(), "routing cache rebuilt");
    }

    /// Cached best URL for a function, if any host could serve it on the
    /// last refresh cycle
    pub async fn cached_url(&self, function: &str) -> Option<String> {
        self.inner.lock().await.cache.get(function).cloned()
    }

    /// Summary for the status endpoint
    pub async fn status_snapshot(&self) -> StatusSnapshot {
        let state = self.inner.lock().await;
        StatusSnapshot {
            configured: self.is_configured(),
            hosts: state.registry.as_ref().map_or(0, |r| r.host_count()),
            cloud: state.registry.as_ref().is_some_and(|r| r.has_cloud()),
            functions: state.functions.len(),
            generation: state.registry.as_ref().map_or(0, |r| r.generation),
            cached_routes: state.cache.len(),
            last_refreshed: state.last_refreshed,
        }
    }
}
