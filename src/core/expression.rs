//! Submitted expressions and their resolution state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::node::Node;
use crate::error::{Error, Result};

/// Process-wide, monotonically increasing expression identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpressionId(pub u64);

impl std::fmt::Display for ExpressionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ExpressionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Expression status in its lifecycle.
///
/// Serialized as the integer codes workers and clients already know:
/// Done=0, Computing=1, Pending=2, Error=3. Transitions only move forward
/// along Pending -> Computing -> {Done, Error}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ExpressionStatus {
    Done,
    Computing,
    Pending,
    Error,
}

impl ExpressionStatus {
    pub fn code(&self) -> u8 {
        match self {
            Self::Done => 0,
            Self::Computing => 1,
            Self::Pending => 2,
            Self::Error => 3,
        }
    }

    /// Done and Error are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    fn stage(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Computing => 1,
            Self::Done | Self::Error => 2,
        }
    }

    /// Whether moving from `self` to `next` respects forward-only ordering.
    pub fn can_transition_to(&self, next: ExpressionStatus) -> bool {
        !self.is_terminal() && next.stage() > self.stage()
    }
}

impl From<ExpressionStatus> for u8 {
    fn from(status: ExpressionStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for ExpressionStatus {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, String> {
        match code {
            0 => Ok(Self::Done),
            1 => Ok(Self::Computing),
            2 => Ok(Self::Pending),
            3 => Ok(Self::Error),
            other => Err(format!("unknown expression status code {}", other)),
        }
    }
}

impl std::fmt::Display for ExpressionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Computing => write!(f, "computing"),
            Self::Pending => write!(f, "pending"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A submitted arithmetic expression.
///
/// `result` is only set once the status is Done; `error` only once it is
/// Error. The tree is attached when compilation succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    pub id: ExpressionId,
    /// The expression text as submitted.
    pub name: String,
    pub status: ExpressionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<Node>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Expression {
    /// Create a Pending expression for the given source text.
    pub fn new(id: ExpressionId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            status: ExpressionStatus::Pending,
            result: None,
            error: None,
            node: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    fn transition(&mut self, next: ExpressionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Attach the compiled tree and move to Computing.
    pub fn start_computing(&mut self, node: Node) -> Result<()> {
        self.transition(ExpressionStatus::Computing)?;
        self.node = Some(node);
        Ok(())
    }

    /// Record the final value and move to Done.
    pub fn complete(&mut self, result: f64) -> Result<()> {
        self.transition(ExpressionStatus::Done)?;
        self.result = Some(result);
        Ok(())
    }

    /// Record the failure reason and move to Error.
    pub fn fail(&mut self, reason: &str) -> Result<()> {
        self.transition(ExpressionStatus::Error)?;
        self.error = Some(reason.to_string());
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
