//! Concurrent expression and task storage.

pub mod queue;
pub mod task_store;

pub use queue::{is_ready, scan_pending, PendingQueue, ScanDecision};
pub use task_store::{TaskStore, UpdateOutcome, DEFAULT_QUEUE_CAPACITY};
