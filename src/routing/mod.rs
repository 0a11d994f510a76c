//! # Routing
//!
//! The decision half of the service: the selector picks the best host for
//! one function against the live registry, and the cache precomputes that
//! answer for every known function once per refresh cycle.

pub mod cache;
pub mod selector;

pub use cache::rebuild_cache;
pub use selector::select_best_url;
