//! Binary arithmetic operators.
//!
//! The same `apply` is used by agents when they execute a task and by the
//! store when it evaluates an expression tree, so both sides agree on what
//! counts as an arithmetic failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure raised while evaluating an operator on concrete values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("division by zero")]
    DivisionByZero,
}

/// One of the four supported operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
}

impl Operation {
    /// Map an expression character to its operator.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(Self::Add),
            '-' => Some(Self::Subtract),
            '*' => Some(Self::Multiply),
            '/' => Some(Self::Divide),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '*',
            Self::Divide => '/',
        }
    }

    /// Binding strength used by the shunting-yard conversion.
    ///
    /// `*` and `/` bind tighter than `+` and `-`. All operators are
    /// left-associative.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Add | Self::Subtract => 1,
            Self::Multiply | Self::Divide => 2,
        }
    }

    /// Apply the operator to `lhs` and `rhs`.
    ///
    /// # Errors
    /// Returns [`ArithmeticError::DivisionByZero`] when dividing by zero.
    pub fn apply(&self, lhs: f64, rhs: f64) -> Result<f64, ArithmeticError> {
        match self {
            Self::Add => Ok(lhs + rhs),
            Self::Subtract => Ok(lhs - rhs),
            Self::Multiply => Ok(lhs * rhs),
            Self::Divide => {
                if rhs == 0.0 {
                    return Err(ArithmeticError::DivisionByZero);
                }
                Ok(lhs / rhs)
            }
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
