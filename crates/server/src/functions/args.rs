//! Argument extraction for function calls.
//!
//! Orchestrators are loose about types: ids arrive as numbers or numeric
//! strings, optional fields as `null` or absent. Everything is normalized
//! here before any store access.

use serde_json::Value;
use thiserror::Error;

/// Hostname used when a call does not name its shop.
pub const DEFAULT_HOSTNAME: &str = "localhost";

/// Upper bound for a caller-supplied search limit.
pub const MAX_SEARCH_LIMIT: usize = 20;

/// An argument was present but not usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid argument `{0}`")]
pub struct InvalidArgument(pub &'static str);

/// The shop hostname, defaulting to [`DEFAULT_HOSTNAME`].
#[must_use]
pub fn hostname(args: &Value) -> String {
    args.get("hostname")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or(DEFAULT_HOSTNAME)
        .to_string()
}

/// A non-empty string argument, trimmed.
#[must_use]
pub fn text<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// An optional id. `null` and absent are `None`; zero, negative, fractional
/// or non-numeric values are invalid.
///
/// # Errors
///
/// Returns `InvalidArgument` naming `key` when the value is present but not a
/// positive integer accepted by `make`.
pub fn optional_id<T>(
    args: &Value,
    key: &'static str,
    make: impl Fn(i64) -> Option<T>,
) -> Result<Option<T>, InvalidArgument> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => integer(value)
            .and_then(make)
            .map(Some)
            .ok_or(InvalidArgument(key)),
    }
}

/// A required id.
///
/// # Errors
///
/// Returns `InvalidArgument` naming `key` when the value is missing or invalid.
pub fn required_id<T>(
    args: &Value,
    key: &'static str,
    make: impl Fn(i64) -> Option<T>,
) -> Result<T, InvalidArgument> {
    optional_id(args, key, make)?.ok_or(InvalidArgument(key))
}

/// Quantity to add, defaulting to 1.
///
/// # Errors
///
/// Returns `InvalidArgument("quantity")` for values below 1 or above `i32::MAX`.
pub fn quantity(args: &Value) -> Result<i32, InvalidArgument> {
    match args.get("quantity") {
        None | Some(Value::Null) => Ok(1),
        Some(value) => integer(value)
            .filter(|q| *q > 0)
            .and_then(|q| i32::try_from(q).ok())
            .ok_or(InvalidArgument("quantity")),
    }
}

/// Optional search limit; unusable values fall back to the default.
#[must_use]
pub fn limit(args: &Value) -> Option<usize> {
    args.get("limit")
        .and_then(integer)
        .filter(|l| *l > 0)
        .and_then(|l| usize::try_from(l).ok())
        .map(|l| l.min(MAX_SEARCH_LIMIT))
}

/// Interpret a JSON value as an integer: integral numbers and numeric strings.
#[allow(clippy::cast_possible_truncation)] // magnitude checked before the cast
fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
