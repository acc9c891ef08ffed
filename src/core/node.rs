//! Binary expression tree.
//!
//! Leaves are numeric literals and internal nodes are operators with
//! exactly two children. The tree is the authoritative form of an
//! expression: the store evaluates it from scratch once every task of the
//! expression has been reported complete.

use serde::{Deserialize, Serialize};

use crate::core::operation::{ArithmeticError, Operation};

/// Canonical text form of a numeric literal.
///
/// `2.0` renders as `"2"` and `0.8` as `"0.8"`, so task operands read the
/// way they were written.
pub fn format_literal(value: f64) -> String {
    format!("{}", value)
}

/// A node of the expression tree. Each node exclusively owns its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// A numeric leaf.
    Literal(f64),
    /// An operator applied to two subtrees.
    Operator {
        operation: Operation,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    pub fn literal(value: f64) -> Self {
        Self::Literal(value)
    }

    pub fn operator(operation: Operation, left: Node, right: Node) -> Self {
        Self::Operator {
            operation,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// True for a literal leaf equal to zero (either sign).
    pub fn is_zero_literal(&self) -> bool {
        matches!(self, Self::Literal(v) if *v == 0.0)
    }

    /// The node's text value: a literal's canonical form or an operator symbol.
    pub fn value(&self) -> String {
        match self {
            Self::Literal(v) => format_literal(*v),
            Self::Operator { operation, .. } => operation.to_string(),
        }
    }

    /// Number of operator nodes, which is also the number of tasks the
    /// tree compiles to.
    pub fn operator_count(&self) -> usize {
        match self {
            Self::Literal(_) => 0,
            Self::Operator { left, right, .. } => {
                1 + left.operator_count() + right.operator_count()
            }
        }
    }

    /// Evaluate the tree bottom-up with standard arithmetic.
    ///
    /// # Errors
    /// Returns [`ArithmeticError::DivisionByZero`] when any divisor
    /// evaluates to zero, including divisors that are only zero at runtime
    /// such as `4/(1-1)`.
    pub fn evaluate(&self) -> Result<f64, ArithmeticError> {
        match self {
            Self::Literal(v) => Ok(*v),
            Self::Operator {
                operation,
                left,
                right,
            } => {
                let lhs = left.evaluate()?;
                let rhs = right.evaluate()?;
                operation.apply(lhs, rhs)
            }
        }
    }

    /// Fully parenthesized in-order rendering, e.g. `((5 + 2) + (4 / 5))`.
    pub fn to_infix(&self) -> String {
        match self {
            Self::Literal(v) => format_literal(*v),
            Self::Operator {
                operation,
                left,
                right,
            } => format!("({} {} {})", left.to_infix(), operation, right.to_infix()),
        }
    }
}
