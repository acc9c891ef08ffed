//! Request and response bodies for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::core::{Expression, ExpressionId, ExpressionStatus, Task};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateRequest {
    pub expression: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateResponse {
    pub id: ExpressionId,
    /// Set when the expression was stored but rejected by the compiler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Client-facing view of an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionView {
    pub id: ExpressionId,
    pub name: String,
    pub status: ExpressionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Expression> for ExpressionView {
    fn from(e: &Expression) -> Self {
        Self {
            id: e.id,
            name: e.name.clone(),
            status: e.status,
            result: e.result,
            error: e.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionResponse {
    pub expression: ExpressionView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionListResponse {
    pub expressions: Vec<ExpressionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task: Task,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResultResponse {
    pub result: f64,
}
