use thiserror::Error;

use crate::compiler::CompileError;
use crate::core::{ExpressionId, ExpressionStatus};

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Expression {id} rejected: {source}")]
    Compile {
        id: ExpressionId,
        #[source]
        source: CompileError,
    },

    #[error("Missing task ID")]
    MissingTaskId,

    #[error("Malformed task ID: {0}")]
    MalformedTaskId(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task result not available: {0}")]
    TaskNotCompleted(String),

    #[error("Expression not found: {0}")]
    ExpressionNotFound(ExpressionId),

    #[error("Pending queue is full (capacity: {capacity})")]
    QueueFull { capacity: usize },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: ExpressionStatus,
        to: ExpressionStatus,
    },

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
