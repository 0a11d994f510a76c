//! Best-host selection
//!
//! The selector scans the registry's edge/fog hosts in their stored
//! priority order and returns the first host that serves the requested
//! function, is off cooldown, and has CPU/RAM headroom. The scan
//! short-circuits, so lower-priority hosts are never inspected once a
//! higher-priority host qualifies. When no edge/fog host qualifies, the
//! cloud host is the fallback, gated only by its own opt-in cooldown.
//!
//! Selection is not read-only: the chosen entry's usage timestamp is
//! stamped, which is what enforces the cooldown on later scans.

use std::time::Instant;

use tracing::{debug, trace};

use crate::registry::HostRegistry;

/// Pick the best invocation URL for `function_name`, or `None` when no
/// host currently qualifies
pub fn select_best_url(
    registry: &mut HostRegistry,
    function_name: &str,
    now: Instant,
) -> Option<String> {
    for host in registry.hosts.iter_mut() {
        let Some(url) = host.url_for_function(function_name).map(str::to_string) else {
            continue;
        };

        if host.on_cooldown(now) {
            trace!(host = %host.name, function = function_name, "skipped: on cooldown");
            continue;
        }

        if !host.has_headroom() {
            debug!(
                host = %host.name,
                function = function_name,
                cpu = host.cpu_use,
                ram = host.ram_use,
                "skipped: no resource headroom"
            );
            continue;
        }

        host.mark_selected(now);
        trace!(host = %host.name, function = function_name, %url, "selected");
        return Some(url);
    }

    if let Some(cloud) = registry.cloud.as_mut() {
        if let Some(url) = cloud.url_for_function(function_name).map(str::to_string) {
            if cloud.on_cooldown(now) {
                trace!(host = %cloud.name, function = function_name, "cloud on cooldown");
            } else {
                cloud.mark_selected(now);
                debug!(host = %cloud.name, function = function_name, "fell back to cloud");
                return Some(url);
            }
        }
    }

    None
}
