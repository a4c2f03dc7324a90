//! Runtime values for key columns and predicate literals.
//!
//! This is not the on-page representation; see `index::key` for that.

use std::cmp::Ordering;

use crate::{
    error::{IndexError, IndexResult},
    types::datatype::DataType,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Date(i32),
    String(String),
    Null,
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Parses a shell literal for a column of type `ty`. `null` is accepted for any type.
    pub fn parse_as(text: &str, ty: DataType) -> IndexResult<Value> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("null") {
            return Ok(Value::Null);
        }

        let bad = || IndexError::Encoding(format!("'{text}' is not a valid {ty} literal"));

        match ty {
            DataType::Int => text.parse().map(Value::Int32).map_err(|_| bad()),
            DataType::Long => text.parse().map(Value::Int64).map_err(|_| bad()),
            DataType::Double => text.parse().map(Value::Float64).map_err(|_| bad()),
            DataType::Date => text.parse().map(Value::Date).map_err(|_| bad()),
            DataType::Char | DataType::Varchar { .. } => {
                let unquoted = text
                    .strip_prefix('\'')
                    .and_then(|s| s.strip_suffix('\''))
                    .unwrap_or(text);
                Ok(Value::String(unquoted.to_string()))
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int32(_) | Value::Int64(_) | Value::Float64(_) => 1,
            Value::Date(_) => 2,
            Value::String(_) => 3,
        }
    }
}

/// Ascending comparison of two values.
///
/// NULL sorts lowest. INT and LONG compare by widening; either against DOUBLE
/// compares as `f64`. Values of unrelated types order by type rank.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,

        (Value::Int32(x), Value::Int32(y)) => x.cmp(y),
        (Value::Int64(x), Value::Int64(y)) => x.cmp(y),
        (Value::Int32(x), Value::Int64(y)) => (*x as i64).cmp(y),
        (Value::Int64(x), Value::Int32(y)) => x.cmp(&(*y as i64)),

        (Value::Float64(x), Value::Float64(y)) => x.total_cmp(y),
        (Value::Float64(x), Value::Int32(y)) => x.total_cmp(&(*y as f64)),
        (Value::Float64(x), Value::Int64(y)) => x.total_cmp(&(*y as f64)),
        (Value::Int32(x), Value::Float64(y)) => (*x as f64).total_cmp(y),
        (Value::Int64(x), Value::Float64(y)) => (*x as f64).total_cmp(y),

        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),

        _ => a.rank().cmp(&b.rank()),
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "DATE({v})"),
            Value::String(v) => write!(f, "'{v}'"),
        }
    }
}

/// Renders a key as `(a, b, ...)` for error messages and the shell.
pub fn format_key(values: &[Value]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("({})", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_and_long_compare_by_widening() {
        assert_eq!(
            compare_values(&Value::Int32(5), &Value::Int64(5)),
            Ordering::Equal
        );
        assert_eq!(
            compare_values(&Value::Int64(-1), &Value::Int32(3)),
            Ordering::Less
        );
    }

    #[test]
    fn null_sorts_first() {
        assert_eq!(
            compare_values(&Value::Null, &Value::Int32(i32::MIN)),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&Value::String("".into()), &Value::Null),
            Ordering::Greater
        );
    }

    #[test]
    fn parse_literals() {
        assert_eq!(
            Value::parse_as("42", DataType::Int).unwrap(),
            Value::Int32(42)
        );
        assert_eq!(
            Value::parse_as("'abc'", DataType::Char).unwrap(),
            Value::String("abc".into())
        );
        assert_eq!(Value::parse_as("NULL", DataType::Long).unwrap(), Value::Null);
        assert!(Value::parse_as("x", DataType::Double).is_err());
    }
}
