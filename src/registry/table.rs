//! The host registry - one immutable-per-reload routing table
//!
//! A registry is built wholesale by the config loader and atomically
//! replaces its predecessor; individual entries are mutated in place
//! (telemetry, usage timestamps) only between reloads. The stored host
//! order is the selection scan order.

use std::collections::BTreeSet;
use std::time::Duration;

use super::host::{function_name_of, CloudEntry, HostEntry};

/// A target for one telemetry poll, snapshotted under the lock so the
/// network I/O can happen outside it
#[derive(Debug, Clone)]
pub struct PollTarget {
    /// Index into `HostRegistry::hosts` at snapshot time
    pub host_index: usize,
    pub name: String,
    pub prometheus_api_url: String,
}

/// Priority-ordered edge/fog hosts, at most one cloud host, and the
/// refresh interval they were configured with
#[derive(Debug, Clone)]
pub struct HostRegistry {
    /// Scan order: configuration order with `low`-priority hosts moved
    /// after all non-low hosts (stable otherwise)
    pub hosts: Vec<HostEntry>,
    pub cloud: Option<CloudEntry>,
    pub refresh_interval: Duration,
    /// Stamped when the registry is installed; guards telemetry write-back
    /// across reload boundaries
    pub generation: u64,
}

impl HostRegistry {
    /// Build a registry, applying the scan-order sort
    pub fn new(
        refresh_interval: Duration,
        mut hosts: Vec<HostEntry>,
        cloud: Option<CloudEntry>,
    ) -> Self {
        // Stable sort: low-priority hosts last, everything else keeps
        // configuration order
        hosts.sort_by_key(|host| host.priority.is_low());

        Self {
            hosts,
            cloud,
            refresh_interval,
            generation: 0,
        }
    }

    /// Every function name served by any host or the cloud, deduplicated
    /// and sorted
    pub fn function_names(&self) -> Vec<String> {
        let mut names: BTreeSet<&str> = self
            .hosts
            .iter()
            .flat_map(|host| host.faas_urls.iter())
            .map(|url| function_name_of(url))
            .collect();

        if let Some(cloud) = &self.cloud {
            names.extend(cloud.faas_urls.iter().map(|url| function_name_of(url)));
        }

        names.into_iter().map(str::to_string).collect()
    }

    /// Snapshot the monitoring endpoints for one poll cycle
    pub fn poll_targets(&self) -> Vec<PollTarget> {
        self.hosts
            .iter()
            .enumerate()
            .map(|(host_index, host)| PollTarget {
                host_index,
                name: host.name.clone(),
                prometheus_api_url: host.prometheus_api_url.clone(),
            })
            .collect()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn has_cloud(&self) -> bool {
        self.cloud.is_some()
    }
}
