//! Postfix to expression tree.

use crate::compiler::error::CompileError;
use crate::compiler::tokenizer::Token;
use crate::core::Node;

/// Build an expression tree from postfix tokens with an operand stack.
///
/// An operator pops its right operand first, then its left, so `8 2 -`
/// becomes `8 - 2`.
///
/// # Errors
/// - [`CompileError::EmptyExpression`] for an empty token list
/// - [`CompileError::InvalidSymbol`] for a number that does not parse
/// - [`CompileError::InvalidRpn`] when an operator lacks two operands, when
///   parentheses remain, or when more than one tree is left over
pub fn build_tree(postfix: &[Token]) -> Result<Node, CompileError> {
    if postfix.is_empty() {
        return Err(CompileError::EmptyExpression);
    }

    let mut stack: Vec<Node> = Vec::new();

    for token in postfix {
        match token {
            Token::Number(text) => {
                let value: f64 = text
                    .parse()
                    .map_err(|_| CompileError::InvalidSymbol(text.clone()))?;
                stack.push(Node::literal(value));
            }
            Token::Operator(op) => {
                let right = stack.pop().ok_or(CompileError::InvalidRpn)?;
                let left = stack.pop().ok_or(CompileError::InvalidRpn)?;
                stack.push(Node::operator(*op, left, right));
            }
            Token::LeftParen | Token::RightParen => return Err(CompileError::InvalidRpn),
        }
    }

    let root = stack.pop().ok_or(CompileError::InvalidRpn)?;
    if !stack.is_empty() {
        return Err(CompileError::InvalidRpn);
    }
    Ok(root)
}
