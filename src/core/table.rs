//! Pipe-delimited DDDB table tokenizer

use crate::types::{EnvisatError, EnvisatResult, SchemaParams};

/// Null value marker in DDDB tables
pub const NULL_VALUE: &str = "*";

/// Separators between factors of a size expression
const DIMSIZE_SEPARATORS: &[char] = &[',', '*'];

/// Split a table into rows of trimmed tokens. Comment lines (`#`) and rows
/// whose first column is empty are skipped.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .map(|line| line.split('|').map(|t| t.trim().to_string()).collect::<Vec<_>>())
        .filter(|tokens| is_valid_data_line(tokens))
        .collect()
}

fn is_valid_data_line(tokens: &[String]) -> bool {
    match tokens.first() {
        Some(first) => !first.is_empty() && !first.starts_with('#'),
        None => false,
    }
}

/// Token at `index`, or `None` for missing, empty and `*` tokens
pub fn token_value(tokens: &[String], index: usize) -> Option<&str> {
    tokens
        .get(index)
        .map(|t| t.as_str())
        .filter(|t| !t.is_empty() && *t != NULL_VALUE)
}

/// Evaluate a size expression: a product of integer literals and named
/// parameters joined by `*` or `,`. Empty and `*` evaluate to 1.
pub fn parse_integer_field(expr: &str, params: Option<&SchemaParams>) -> EnvisatResult<i64> {
    let expr = expr.trim();
    if expr.is_empty() || expr == NULL_VALUE {
        return Ok(1);
    }

    let mut product = 1i64;
    for token in expr.split(DIMSIZE_SEPARATORS).map(str::trim).filter(|t| !t.is_empty()) {
        let factor = match token.parse::<i64>() {
            Ok(value) => value,
            Err(_) => match params {
                Some(params) => *params.get(token).ok_or_else(|| {
                    EnvisatError::SchemaIntegrity(format!(
                        "missing DDDB field size parameter '{}'",
                        token
                    ))
                })?,
                None => {
                    return Err(EnvisatError::SchemaIntegrity(format!(
                        "invalid DDDB field size value '{}'",
                        token
                    )))
                }
            },
        };
        product = product.checked_mul(factor).ok_or_else(|| {
            EnvisatError::SchemaIntegrity(format!("DDDB field size overflow in '{}'", expr))
        })?;
    }
    Ok(product)
}
