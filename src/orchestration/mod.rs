//! Orchestration layer.
//!
//! The dispatcher ties the compiler to the task store: it turns submitted
//! text into queued tasks and serves the pull / post-result protocol that
//! agents speak.

mod dispatcher;

pub use dispatcher::Dispatcher;
