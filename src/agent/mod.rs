//! Computing agents.
//!
//! An agent pulls ready tasks from the orchestrator over HTTP, computes
//! them after the configured per-operation delay and posts the result
//! back. The pool runs `computing_power` agents side by side.

pub mod client;
pub mod pool;
pub mod worker;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::TaskId;

pub use client::DispatchClient;
pub use pool::AgentPool;
pub use worker::{Agent, AgentStats};

/// Unique identifier for an agent loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 characters of the UUID, for logs.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events emitted by agents as they work.
///
/// These let callers such as tests observe progress without polling the
/// orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// An agent pulled a task and started on it.
    Started { agent_id: AgentId, task_id: TaskId },
    /// A result was posted.
    Completed {
        agent_id: AgentId,
        task_id: TaskId,
        value: f64,
    },
    /// An error report was posted.
    Failed {
        agent_id: AgentId,
        task_id: TaskId,
        error: String,
    },
    /// The agent loop exited.
    Stopped { agent_id: AgentId },
}
