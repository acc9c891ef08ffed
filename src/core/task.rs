//! Task data model.
//!
//! A task is one binary operation taken from an expression tree. Its
//! operands are either numeric literals or references to other tasks of the
//! same expression whose results must exist first.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::core::expression::ExpressionId;
use crate::core::node::format_literal;
use crate::core::operation::Operation;
use crate::error::Error;

static TASK_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^task-expr-(\d+)-(\d+)$").unwrap());

/// Identifier of a task within its expression.
///
/// Renders as `task-expr-<expression>-<sequence>`; the owning expression is
/// recovered from the id itself when a result is posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId {
    expression: ExpressionId,
    sequence: usize,
}

impl TaskId {
    pub fn new(expression: ExpressionId, sequence: usize) -> Self {
        Self {
            expression,
            sequence,
        }
    }

    /// The expression this task belongs to.
    pub fn expression(&self) -> ExpressionId {
        self.expression
    }

    /// Zero-based position in the expression's compile order.
    pub fn sequence(&self) -> usize {
        self.sequence
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-expr-{}-{}", self.expression, self.sequence)
    }
}

impl std::str::FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let malformed = || Error::MalformedTaskId(s.to_string());
        let caps = TASK_ID_RE.captures(s).ok_or_else(malformed)?;
        let expression = caps[1].parse().map_err(|_| malformed())?;
        let sequence = caps[2].parse().map_err(|_| malformed())?;
        Ok(Self::new(ExpressionId(expression), sequence))
    }
}

impl TryFrom<String> for TaskId {
    type Error = Error;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}

/// A task operand: a literal value or the id of a task whose result is used.
///
/// On the wire both are plain strings. A string that parses as a number is
/// a literal; anything else must be a task id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operand {
    Literal(f64),
    Task(TaskId),
}

impl Operand {
    /// The referenced task, if this operand is not a literal.
    pub fn dependency(&self) -> Option<TaskId> {
        match self {
            Self::Literal(_) => None,
            Self::Task(id) => Some(*id),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{}", format_literal(*v)),
            Self::Task(id) => write!(f, "{}", id),
        }
    }
}

impl std::str::FromStr for Operand {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(value) = s.parse::<f64>() {
            return Ok(Self::Literal(value));
        }
        Ok(Self::Task(s.parse()?))
    }
}

impl TryFrom<String> for Operand {
    type Error = Error;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Operand> for String {
    fn from(operand: Operand) -> Self {
        operand.to_string()
    }
}

/// A single binary operation awaiting execution.
///
/// `result` is meaningful only once `completed` is set. A task is completed
/// exactly once; later reports for it are ignored by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub arg1: Operand,
    pub arg2: Operand,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    #[serde(default)]
    pub completed: bool,
    /// Error reported by the agent that executed the task, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    pub fn new(id: TaskId, arg1: Operand, arg2: Operand, operation: Operation) -> Self {
        Self {
            id,
            arg1,
            arg2,
            operation,
            result: None,
            completed: false,
            error: None,
        }
    }

    /// Record a successful result.
    pub fn complete(&mut self, value: f64) {
        self.result = Some(value);
        self.completed = true;
    }

    /// Record an execution error. The task counts as completed: it will
    /// never be dispatched again.
    pub fn fail(&mut self, error: &str) {
        self.error = Some(error.to_string());
        self.completed = true;
    }

    /// Ids of the tasks this one depends on, in operand order.
    pub fn dependencies(&self) -> impl Iterator<Item = TaskId> {
        [self.arg1.dependency(), self.arg2.dependency()]
            .into_iter()
            .flatten()
    }

    /// True when both operands are literals.
    pub fn is_leaf(&self) -> bool {
        self.arg1.is_literal() && self.arg2.is_literal()
    }
}

/// An agent's report for one task.
///
/// `task_id` stays a raw string so an empty or malformed id can be told
/// apart from an unknown one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    pub fn success(task_id: TaskId, value: f64) -> Self {
        Self {
            task_id: task_id.to_string(),
            value,
            error: None,
        }
    }

    pub fn failure(task_id: TaskId, error: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            value: 0.0,
            error: Some(error.to_string()),
        }
    }
}
