//! Infix to postfix conversion (shunting-yard).

use crate::compiler::error::CompileError;
use crate::compiler::tokenizer::Token;

/// Reorder infix tokens into postfix order.
///
/// Operators are left-associative: an incoming operator first pops every
/// stacked operator of greater or equal precedence. No arithmetic happens
/// here.
///
/// # Errors
/// Returns [`CompileError::InvalidExpression`] for a `)` without a matching
/// `(` and for a `(` that is never closed.
pub fn to_postfix(tokens: &[Token]) -> Result<Vec<Token>, CompileError> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Token> = Vec::new();

    for token in tokens {
        match token {
            Token::Number(_) => output.push(token.clone()),
            Token::LeftParen => stack.push(Token::LeftParen),
            Token::RightParen => loop {
                match stack.pop() {
                    Some(Token::LeftParen) => break,
                    Some(op) => output.push(op),
                    None => return Err(CompileError::InvalidExpression("unmatched ')'")),
                }
            },
            Token::Operator(incoming) => {
                while let Some(Token::Operator(top)) = stack.last() {
                    if top.precedence() < incoming.precedence() {
                        break;
                    }
                    output.push(Token::Operator(*top));
                    stack.pop();
                }
                stack.push(Token::Operator(*incoming));
            }
        }
    }

    while let Some(token) = stack.pop() {
        if token == Token::LeftParen {
            return Err(CompileError::InvalidExpression("unmatched '('"));
        }
        output.push(token);
    }

    Ok(output)
}
