//! faasnet - adaptive routing for FaaS invocations
//!
//! Routes function invocations across a three-tier compute hierarchy
//! (edge, fog, cloud). A hot-reloadable host registry tracks per-host
//! resource telemetry polled from Prometheus; the selector picks the
//! lowest-tier host that serves the function, has CPU/RAM headroom, and is
//! off cooldown, falling back to the cloud tier. Results are precomputed
//! into a routing cache served by a small HTTP API.

pub mod cli;
pub mod config;
pub mod registry;
pub mod routing;
pub mod server;
pub mod telemetry;
