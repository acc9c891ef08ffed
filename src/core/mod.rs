//! Core domain models.
//!
//! Expression trees, the tasks compiled from them, the expressions that own
//! both, and the per-expression task graph.

pub mod dag;
pub mod expression;
pub mod node;
pub mod operation;
pub mod task;

pub use dag::TaskGraph;
pub use expression::{Expression, ExpressionId, ExpressionStatus};
pub use node::{format_literal, Node};
pub use operation::{ArithmeticError, Operation};
pub use task::{Operand, Task, TaskId, TaskResult};
