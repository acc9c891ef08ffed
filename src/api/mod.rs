//! HTTP API: expression submission and queries for clients, plus the
//! pull / post-result protocol for agents.

mod routes;
pub mod types;

pub use routes::{router, serve, AppState};
