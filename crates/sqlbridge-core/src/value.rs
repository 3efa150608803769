//! Dynamic SQL cell values.

use serde::{Deserialize, Serialize};

/// A dynamically-typed result cell.
///
/// The native wire clients run the text protocols, so they only ever
/// produce `Null` and `Text`. The numeric variants come from the fallback
/// drivers (which decode typed columns) and from the synthesized row for
/// fallback write statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Text string (also the raw form of every native-path cell)
    Text(String),

    /// 64-bit signed integer
    BigInt(i64),

    /// 64-bit floating point
    Double(f64),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Text(_) => "TEXT",
            Value::BigInt(_) => "BIGINT",
            Value::Double(_) => "DOUBLE",
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to convert this value to an i64.
    ///
    /// Textual cells are parsed, matching how the text protocols deliver
    /// numeric columns.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::BigInt(v) => Some(*v),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to convert this value to an f64. Textual cells are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::BigInt(v) => Some(*v as f64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to convert this value to a bool.
    ///
    /// Accepts the server spellings from both providers: Postgres sends
    /// `t`/`f`, MySQL sends `1`/`0`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::BigInt(v) => Some(*v != 0),
            Value::Text(s) => match s.trim() {
                "t" | "true" | "TRUE" | "1" => Some(true),
                "f" | "false" | "FALSE" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Text(s) => write!(f, "{s}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
