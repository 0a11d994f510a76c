//! Host entries - the per-machine records of the routing table
//!
//! An edge or fog host carries static capacity ceilings from the
//! configuration plus mutable telemetry written by the background poller.
//! The cloud host is the unconditional fallback: it has no monitoring
//! endpoint and no resource ceilings, only an optional cooldown.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Compute tier a host belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Closest to the caller, smallest capacity
    Edge,
    /// Intermediate tier
    Fog,
    /// Remote fallback with assumed unconstrained capacity
    Cloud,
}

/// Priority label from the configuration.
///
/// Only the `low` distinction affects ordering: `low` hosts sort after all
/// non-low hosts, everything else keeps its configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(String);

impl Priority {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Whether this host should be considered only after all non-low hosts
    pub fn is_low(&self) -> bool {
        self.0 == "low"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An edge or fog host in the routing table
#[derive(Debug, Clone)]
pub struct HostEntry {
    /// Host name from the configuration
    pub name: String,
    /// Priority label (scan order bias, see [`Priority`])
    pub priority: Priority,
    /// Edge or fog (never cloud, see [`CloudEntry`])
    pub layer: Layer,
    /// Invocation URLs; the final path segment of each names the function
    pub faas_urls: Vec<String>,
    /// Prometheus instant-query endpoint for this host
    pub prometheus_api_url: String,
    /// Configured CPU utilization ceiling (percent)
    pub max_cpu: f64,
    /// Configured RAM utilization ceiling (percent)
    pub max_ram: f64,
    /// Minimum spacing between successive selections of this host
    pub min_request_interval: Duration,
    /// Last polled CPU utilization (percent); `f64::INFINITY` after a
    /// failed poll
    pub cpu_use: f64,
    /// Last polled RAM utilization (percent); `f64::INFINITY` after a
    /// failed poll
    pub ram_use: f64,
    /// When this host was last selected; `None` means immediately eligible
    pub last_used_at: Option<Instant>,
}

impl HostEntry {
    /// The URL this host serves `function` on, if any
    pub fn url_for_function(&self, function: &str) -> Option<&str> {
        url_for_function(&self.faas_urls, function)
    }

    /// Whether the last telemetry reading is below both ceilings
    pub fn has_headroom(&self) -> bool {
        self.cpu_use < self.max_cpu && self.ram_use < self.max_ram
    }

    /// Whether a selection now would violate the cooldown
    pub fn on_cooldown(&self, now: Instant) -> bool {
        match self.last_used_at {
            Some(used) => now.saturating_duration_since(used) < self.min_request_interval,
            None => false,
        }
    }

    /// Record a successful selection of this host
    pub fn mark_selected(&mut self, now: Instant) {
        self.last_used_at = Some(now);
    }

    /// Store a fresh telemetry reading
    pub fn record_utilization(&mut self, cpu: f64, ram: f64) {
        self.cpu_use = cpu;
        self.ram_use = ram;
    }

    /// Force both utilizations to infinity after a failed poll, so the
    /// host is unselectable without a separate liveness flag
    pub fn poison(&mut self) {
        self.cpu_use = f64::INFINITY;
        self.ram_use = f64::INFINITY;
    }
}

/// The single cloud host of a registry
#[derive(Debug, Clone)]
pub struct CloudEntry {
    pub name: String,
    pub faas_urls: Vec<String>,
    /// Cooldown is opt-in for the cloud: `None` means the fallback is
    /// always available
    pub min_request_interval: Option<Duration>,
    pub last_used_at: Option<Instant>,
}

impl CloudEntry {
    pub fn url_for_function(&self, function: &str) -> Option<&str> {
        url_for_function(&self.faas_urls, function)
    }

    /// Cooldown check; a cloud entry without a configured interval is
    /// never on cooldown
    pub fn on_cooldown(&self, now: Instant) -> bool {
        match (self.min_request_interval, self.last_used_at) {
            (Some(interval), Some(used)) => now.saturating_duration_since(used) < interval,
            _ => false,
        }
    }

    pub fn mark_selected(&mut self, now: Instant) {
        self.last_used_at = Some(now);
    }
}

/// Find the URL serving `function` among `urls`.
///
/// A URL serves a function when its final path segment equals the function
/// name; two URLs ending in the same segment are the same function.
pub fn url_for_function<'a>(urls: &'a [String], function: &str) -> Option<&'a str> {
    let suffix = format!("/{function}");
    urls.iter()
        .find(|url| url.ends_with(&suffix))
        .map(String::as_str)
}

/// The function name a URL serves: its final path segment
pub fn function_name_of(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}
