//! Expression tree to task list.

use crate::compiler::error::CompileError;
use crate::core::{ExpressionId, Node, Operand, Operation, Task, TaskId};

struct TaskBuilder {
    expression: ExpressionId,
    next_sequence: usize,
    tasks: Vec<Task>,
}

impl TaskBuilder {
    /// Compile a subtree and return its handle: the literal itself for a
    /// leaf, otherwise the id of the task computing the subtree.
    fn visit(&mut self, node: &Node) -> Result<Operand, CompileError> {
        let (operation, left, right) = match node {
            Node::Literal(value) => return Ok(Operand::Literal(*value)),
            Node::Operator {
                operation,
                left,
                right,
            } => (*operation, left, right),
        };

        let arg1 = self.visit(left)?;
        let arg2 = self.visit(right)?;

        if operation == Operation::Divide && right.is_zero_literal() {
            return Err(CompileError::DivisionByZero);
        }

        let id = TaskId::new(self.expression, self.next_sequence);
        self.next_sequence += 1;
        self.tasks.push(Task::new(id, arg1, arg2, operation));
        Ok(Operand::Task(id))
    }
}

/// Compile an expression tree into one task per operator node.
///
/// Tasks come out in post-order, so every task follows the tasks it
/// references, and sequence numbers count up from zero in that order. A
/// tree that is a single literal compiles to no tasks.
///
/// Only a divisor that is literally zero is caught here. A divisor that
/// merely evaluates to zero, as in `4/(1-1)`, compiles fine and fails when
/// the expression is evaluated.
///
/// # Errors
/// Returns [`CompileError::DivisionByZero`] for a literal zero divisor; no
/// tasks are produced in that case.
pub fn compile(expression: ExpressionId, root: &Node) -> Result<Vec<Task>, CompileError> {
    let mut builder = TaskBuilder {
        expression,
        next_sequence: 0,
        tasks: Vec::with_capacity(root.operator_count()),
    };
    builder.visit(root)?;
    Ok(builder.tasks)
}
