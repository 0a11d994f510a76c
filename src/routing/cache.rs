//! Routing cache - precomputed function-to-URL answers
//!
//! The cache decouples request latency from telemetry-polling latency:
//! after every poll cycle the selector runs once per known function and
//! the results are swapped in wholesale. The API layer only ever reads
//! the cache. A function the selector could not place is simply absent,
//! which the API reports as not found.

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use crate::registry::HostRegistry;

use super::selector::select_best_url;

/// Run the selector for every known function and build a fresh cache.
///
/// Selection stamps usage timestamps on the chosen hosts, so a rebuild
/// participates in cooldown accounting like any other selection.
pub fn rebuild_cache(registry: &mut HostRegistry, functions: &[String]) -> HashMap<String, String> {
    let mut cache = HashMap::with_capacity(functions.len());

    for function in functions {
        match select_best_url(registry, function, Instant::now()) {
            Some(url) => {
                cache.insert(function.clone(), url);
            }
            None => {
                debug!(function = %function, "no host available this cycle");
            }
        }
    }

    cache
}
