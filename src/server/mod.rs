//! # Decision API
//!
//! The HTTP boundary of the service: GET /faas answers from the routing
//! cache, POST /faas swaps in a freshly parsed registry, and /health and
//! /status expose liveness and a small operational summary. All shared
//! state lives in [`AppState`] behind one lock.

pub mod handlers;
pub mod state;

pub use handlers::{create_router, BestFaasResponse};
pub use state::{AppState, PollSnapshot, RouterState, StatusSnapshot};
