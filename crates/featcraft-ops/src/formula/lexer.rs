//! Tokenizer for the formula grammar.
//!
//! Anything outside the token set below is rejected; there is no string
//! literal, attribute access, indexing or assignment.

use crate::traits::OpError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    /// Bare (`price`) or backtick-delimited (`` `unit price` ``) name.
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    Gt,
    Lt,
    Ge,
    Le,
    EqEq,
    NotEq,
}

/// Longest accepted formula, in bytes.
pub const MAX_FORMULA_LEN: usize = 4096;

pub fn tokenize(src: &str) -> Result<Vec<Token>, OpError> {
    if src.len() > MAX_FORMULA_LEN {
        return Err(OpError::InvalidExpression(format!(
            "formula is longer than {MAX_FORMULA_LEN} bytes"
        )));
    }
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => {
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '>' | '<' | '=' | '!' => {
                let next_is_eq = chars.get(i + 1) == Some(&'=');
                let tok = match (c, next_is_eq) {
                    ('>', true) => Token::Ge,
                    ('>', false) => Token::Gt,
                    ('<', true) => Token::Le,
                    ('<', false) => Token::Lt,
                    ('=', true) => Token::EqEq,
                    ('!', true) => Token::NotEq,
                    _ => {
                        return Err(OpError::InvalidExpression(format!(
                            "unexpected '{c}' at position {i}"
                        )))
                    }
                };
                i += if next_is_eq { 2 } else { 1 };
                tokens.push(tok);
            }
            '`' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == '`')
                    .map(|off| start + off)
                    .ok_or_else(|| {
                        OpError::InvalidExpression(format!(
                            "unterminated column name starting at position {i}"
                        ))
                    })?;
                let name: String = chars[start..end].iter().collect();
                if name.is_empty() {
                    return Err(OpError::InvalidExpression(format!(
                        "empty column name at position {i}"
                    )));
                }
                tokens.push(Token::Ident(name));
                i = end + 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // exponent: 1e-3, 2E5
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.parse::<f64>().map_err(|_| {
                    OpError::InvalidExpression(format!("bad number '{text}' at position {start}"))
                })?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(OpError::InvalidExpression(format!(
                    "unexpected '{other}' at position {i}"
                )))
            }
        }
    }

    Ok(tokens)
}
