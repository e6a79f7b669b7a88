use nalgebra::{Matrix3, Vector3};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid --set format: '{0}'. Expected KEY=VALUE.")]
    InvalidAssignment(String),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Expected {expected} numbers, got {found}.")]
    WrongLength { expected: usize, found: usize },
}

/// Splits `-S key=value` into its trimmed parts.
pub fn split_assignment(pair: &str) -> Result<(&str, &str), ParseError> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(ParseError::InvalidAssignment(pair.to_string())),
    }
}

pub fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// `[1, 2, 3]` or `1,2,3`.
pub fn parse_list<T: FromStr>(key: &str, value: &str) -> Result<Vec<T>, ParseError> {
    value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_value(key, item))
        .collect()
}

pub fn vector3(values: &[f64]) -> Result<Vector3<f64>, ParseError> {
    match values {
        [x, y, z] => Ok(Vector3::new(*x, *y, *z)),
        _ => Err(ParseError::WrongLength {
            expected: 3,
            found: values.len(),
        }),
    }
}

/// Row-major 3x3 matrix.
pub fn matrix3(values: &[f64]) -> Result<Matrix3<f64>, ParseError> {
    if values.len() != 9 {
        return Err(ParseError::WrongLength {
            expected: 9,
            found: values.len(),
        });
    }
    Ok(Matrix3::from_row_slice(values))
}
