//! # Host registry
//!
//! The routing table: a priority-ordered list of edge/fog hosts plus at
//! most one cloud host, each carrying static capacity limits from the
//! configuration and a mutable telemetry snapshot written by the
//! background poller.
//!
//! A registry is replaced wholesale on every configuration upload, never
//! patched incrementally. Between reloads its entries are mutated in place
//! by exactly two writers, both inside the server's single lock domain:
//! the telemetry refresher (utilization) and the selector (usage
//! timestamps).

pub mod host;
pub mod table;

pub use host::{function_name_of, url_for_function, CloudEntry, HostEntry, Layer, Priority};
pub use table::{HostRegistry, PollTarget};
