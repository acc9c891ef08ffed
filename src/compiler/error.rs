use thiserror::Error;

/// Reasons an expression is rejected before any task is created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("invalid symbol in expression: {0}")]
    InvalidSymbol(String),

    #[error("invalid expression: {0}")]
    InvalidExpression(&'static str),

    #[error("empty expression")]
    EmptyExpression,

    #[error("invalid RPN expression")]
    InvalidRpn,

    #[error("division by zero")]
    DivisionByZero,
}
