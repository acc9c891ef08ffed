//! Expression compiler.
//!
//! Source text flows through four stages:
//! tokenize -> infix-to-postfix -> postfix-to-tree -> tree-to-tasks.
//! Every stage is a pure function; the first failure aborts the whole
//! compilation.

mod error;
mod postfix;
mod tasks;
mod tokenizer;
mod tree;

pub use error::CompileError;
pub use postfix::to_postfix;
pub use tasks::compile;
pub use tokenizer::{join_tokens, tokenize, Token};
pub use tree::build_tree;

use crate::core::{ExpressionId, Node, Task};

/// Output of a successful compilation.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    pub postfix: Vec<Token>,
    pub tree: Node,
    pub tasks: Vec<Task>,
}

/// Run the full pipeline for one expression.
pub fn compile_expression(
    id: ExpressionId,
    source: &str,
) -> Result<CompiledExpression, CompileError> {
    let tokens = tokenize(source)?;
    let postfix = to_postfix(&tokens)?;
    let tree = build_tree(&postfix)?;
    let tasks = compile(id, &tree)?;
    Ok(CompiledExpression {
        postfix,
        tree,
        tasks,
    })
}
