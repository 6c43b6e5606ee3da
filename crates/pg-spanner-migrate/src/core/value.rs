//! Value representations for scanning and conversion.
//!
//! [`RawValue`] is the untyped per-column slot a source driver scans into:
//! a closed tagged union the conversion matrix dispatches on. [`Value`] is
//! the converted target representation handed to the sink. NULL source
//! values never reach the sink; they are dropped from the emitted column
//! list by the row conversion engine.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;

/// Untyped driver value: the closed set of wire kinds a source scan produces.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Bytes(Vec<u8>),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Timestamp(DateTime<FixedOffset>),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Wire kind name, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Bool(_) => "bool",
            RawValue::Bytes(_) => "bytes",
            RawValue::Int64(_) => "int64",
            RawValue::Float32(_) => "float32",
            RawValue::Float64(_) => "float64",
            RawValue::Text(_) => "text",
            RawValue::Timestamp(_) => "timestamp",
        }
    }

    /// Render the raw value for bad-row samples.
    pub fn sample_text(&self) -> String {
        match self {
            RawValue::Null => "NULL".to_string(),
            RawValue::Bool(v) => v.to_string(),
            RawValue::Bytes(v) => String::from_utf8_lossy(v).into_owned(),
            RawValue::Int64(v) => v.to_string(),
            RawValue::Float32(v) => v.to_string(),
            RawValue::Float64(v) => v.to_string(),
            RawValue::Text(v) => v.clone(),
            RawValue::Timestamp(v) => v.to_rfc3339(),
        }
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        RawValue::Bool(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Int64(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Float64(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(v: Vec<u8>) -> Self {
        RawValue::Bytes(v)
    }
}

/// One scanned source row.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub values: Vec<RawValue>,
}

/// Converted target value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Numeric(Decimal),
    String(String),
    Timestamp(DateTime<FixedOffset>),

    /// Array of element values; `None` entries are element-level NULLs.
    Array(Vec<Option<Value>>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Date(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Numeric(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    match item {
                        Some(v) => write!(f, "{v}")?,
                        None => f.write_str("NULL")?,
                    }
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_kinds() {
        assert!(RawValue::Null.is_null());
        assert!(!RawValue::Bool(true).is_null());
        assert_eq!(RawValue::Int64(7).kind(), "int64");
        assert_eq!(RawValue::Text("x".into()).kind(), "text");
    }

    #[test]
    fn test_sample_text() {
        assert_eq!(RawValue::Null.sample_text(), "NULL");
        assert_eq!(RawValue::Bytes(b"abc".to_vec()).sample_text(), "abc");
        assert_eq!(RawValue::Int64(-3).sample_text(), "-3");
    }

    #[test]
    fn test_value_display() {
        let arr = Value::Array(vec![Some(Value::Int64(1)), None, Some(Value::Int64(3))]);
        assert_eq!(arr.to_string(), "[1,NULL,3]");
    }
}
