//! Scalar classification for the filter DSL and the closed set of bindable
//! SQL parameter values.
//!
//! The filter compiler needs to know whether a user-supplied scalar is an
//! integer, a float, or a string in order to pick the JSON accessor (`->`
//! for numerics, `->>` for text) and the SQL cast (`::int`, `::float`,
//! `::text`). Numeric *strings* count as numbers only when they round-trip:
//! `"42"` is an int, `"1.5"` a float, but `"1.50"` stays a string.

use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;
use uuid::Uuid;

/// True when the value is an integer, or a string whose integer parse
/// round-trips to the same text.
pub fn is_int(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => s.parse::<i64>().map(|n| n.to_string() == *s).unwrap_or(false),
        _ => false,
    }
}

/// True when the value is a number with a fractional part, or a string
/// whose float parse round-trips to the same text.
pub fn is_float(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_f64(),
        Value::String(s) => {
            if is_int(value) {
                return false;
            }
            s.parse::<f64>().map(|f| f.to_string() == *s).unwrap_or(false)
        }
        _ => false,
    }
}

/// True when the value is a string that is not a numeric round-trip.
pub fn is_string(value: &Value) -> bool {
    matches!(value, Value::String(_)) && !is_int(value) && !is_float(value)
}

// ---------------------------------------------------------------------------
// SqlValue
// ---------------------------------------------------------------------------

/// A positional SQL parameter.
///
/// Every user-supplied literal that reaches the database flows through one
/// of these variants and is bound with the driver's parameter machinery.
/// There is intentionally no variant for raw SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Json(Value),
    Uuid(Uuid),
}

impl SqlValue {
    /// Classify a DSL scalar into a typed parameter.
    ///
    /// Numeric strings become numeric parameters, matching the casts the
    /// filter compiler emits for them. Returns `None` for values that have
    /// no scalar binding (arrays, objects, null).
    pub fn from_scalar(value: &Value) -> Option<SqlValue> {
        if is_int(value) {
            let n = match value {
                Value::Number(n) => n.as_i64()?,
                Value::String(s) => s.parse().ok()?,
                _ => return None,
            };
            return Some(SqlValue::Int(n));
        }
        if is_float(value) {
            let f = match value {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.parse().ok()?,
                _ => return None,
            };
            return Some(SqlValue::Float(f));
        }
        match value {
            Value::String(s) => Some(SqlValue::Text(s.clone())),
            Value::Bool(b) => Some(SqlValue::Bool(*b)),
            _ => None,
        }
    }
}

/// Bind a parameter list onto a query in order.
pub fn bind_values<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlValue::Text(v) => query.bind(v),
            SqlValue::Int(v) => query.bind(v),
            SqlValue::Float(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Json(v) => query.bind(v),
            SqlValue::Uuid(v) => query.bind(v),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn int_numbers_and_round_trip_strings() {
        assert!(is_int(&json!(42)));
        assert!(is_int(&json!(-7)));
        assert!(is_int(&json!("42")));
        assert!(is_int(&json!("-7")));
        assert!(!is_int(&json!(1.5)));
        assert!(!is_int(&json!("042"))); // does not round-trip
        assert!(!is_int(&json!("4.0")));
        assert!(!is_int(&json!("hello")));
    }

    #[test]
    fn float_numbers_and_round_trip_strings() {
        assert!(is_float(&json!(1.5)));
        assert!(is_float(&json!("1.5")));
        assert!(is_float(&json!("-0.25")));
        assert!(!is_float(&json!(3)));
        assert!(!is_float(&json!("3")));
        assert!(!is_float(&json!("1.50"))); // does not round-trip
        assert!(!is_float(&json!("abc")));
    }

    #[test]
    fn strings_exclude_numeric_round_trips() {
        assert!(is_string(&json!("hello")));
        assert!(is_string(&json!("1.50")));
        assert!(is_string(&json!("042")));
        assert!(!is_string(&json!("42")));
        assert!(!is_string(&json!("1.5")));
        assert!(!is_string(&json!(42)));
    }

    #[test]
    fn from_scalar_classifies() {
        assert_eq!(SqlValue::from_scalar(&json!(3)), Some(SqlValue::Int(3)));
        assert_eq!(SqlValue::from_scalar(&json!("3")), Some(SqlValue::Int(3)));
        assert_eq!(
            SqlValue::from_scalar(&json!(2.5)),
            Some(SqlValue::Float(2.5))
        );
        assert_eq!(
            SqlValue::from_scalar(&json!("hi")),
            Some(SqlValue::Text("hi".to_string()))
        );
        assert_eq!(
            SqlValue::from_scalar(&json!(true)),
            Some(SqlValue::Bool(true))
        );
        assert_eq!(SqlValue::from_scalar(&json!([1, 2])), None);
        assert_eq!(SqlValue::from_scalar(&Value::Null), None);
    }
}
