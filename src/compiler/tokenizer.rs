//! Tokenizer and validator for raw expression text.

use crate::compiler::error::CompileError;
use crate::core::Operation;

/// A lexical token of an infix or postfix expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Numeric literal as written, possibly with a leading `-` sign.
    Number(String),
    Operator(Operation),
    LeftParen,
    RightParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(text) => write!(f, "{}", text),
            Token::Operator(op) => write!(f, "{}", op),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
        }
    }
}

/// Join tokens with single spaces, e.g. `5 2 + 4 5 / +`.
pub fn join_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A literal such as `05` or `-007` is rejected; `0`, `0.5` and `-0.5` are not.
fn has_leading_zero(literal: &str) -> bool {
    let digits = literal.strip_prefix('-').unwrap_or(literal);
    digits.len() > 1 && digits.starts_with('0') && !digits[1..].starts_with('.')
}

fn flush(pending: &mut String, tokens: &mut Vec<Token>) -> Result<(), CompileError> {
    if pending.is_empty() {
        return Ok(());
    }
    if pending == "-" {
        // A sign with no digits after it, as in `-(2+3)`. Emitted as a plain
        // minus; the tree builder rejects it for lack of a left operand.
        tokens.push(Token::Operator(Operation::Subtract));
    } else if has_leading_zero(pending) {
        return Err(CompileError::InvalidSymbol(pending.clone()));
    } else {
        tokens.push(Token::Number(pending.clone()));
    }
    pending.clear();
    Ok(())
}

/// Split an expression into tokens.
///
/// Whitespace is removed first. Digits and `.` accumulate into a number; a
/// `-` at the very start or right after `(` is a sign for the number that
/// follows.
///
/// # Errors
/// - [`CompileError::EmptyExpression`] for blank input
/// - [`CompileError::InvalidSymbol`] for characters outside
///   `0-9 . + - * / ( )` and for numbers with a leading zero
/// - [`CompileError::InvalidExpression`] for an empty `()` pair
pub fn tokenize(expression: &str) -> Result<Vec<Token>, CompileError> {
    let chars: Vec<char> = expression.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return Err(CompileError::EmptyExpression);
    }

    let mut tokens = Vec::new();
    let mut pending = String::new();

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_ascii_digit() || ch == '.' {
            pending.push(ch);
            continue;
        }

        flush(&mut pending, &mut tokens)?;

        match ch {
            '(' => tokens.push(Token::LeftParen),
            ')' => tokens.push(Token::RightParen),
            '-' if i == 0 || chars[i - 1] == '(' => pending.push('-'),
            _ => match Operation::from_symbol(ch) {
                Some(op) => tokens.push(Token::Operator(op)),
                None => return Err(CompileError::InvalidSymbol(ch.to_string())),
            },
        }
    }
    flush(&mut pending, &mut tokens)?;

    if tokens
        .windows(2)
        .any(|pair| pair[0] == Token::LeftParen && pair[1] == Token::RightParen)
    {
        return Err(CompileError::InvalidExpression("empty parentheses"));
    }

    Ok(tokens)
}
