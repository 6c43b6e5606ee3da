//! Scalar value conversion matrix.
//!
//! Each target type accepts a closed set of raw wire kinds and rejects
//! everything else with a per-value conversion error. Handling the
//! conversions here rather than deferring to the target client gives
//! targeted error messages for bad-row reporting.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use rust_decimal::Decimal;

use crate::core::ddl::TypeKind;
use crate::core::value::{RawValue, Value};
use crate::error::{MigrateError, Result};

/// Convert one raw scalar to the target type `dst`. The caller handles NULL
/// before calling; `src_type` is the source column's declared type name,
/// needed to disambiguate zoned vs. unzoned timestamp text. `tz` is the
/// offset applied to unzoned timestamps.
pub fn convert_scalar(
    col: &str,
    dst: TypeKind,
    src_type: &str,
    tz: FixedOffset,
    val: &RawValue,
) -> Result<Value> {
    match dst {
        TypeKind::Bool => match val {
            RawValue::Bool(v) => Ok(Value::Bool(*v)),
            RawValue::Text(s) => parse_bool(s)
                .map(Value::Bool)
                .ok_or_else(|| MigrateError::convert(col, format!("can't parse '{s}' as bool"))),
            _ => mismatch(col, dst, val),
        },
        TypeKind::Bytes => match val {
            RawValue::Bytes(v) => Ok(Value::Bytes(v.clone())),
            _ => mismatch(col, dst, val),
        },
        TypeKind::Date => match val {
            RawValue::Text(s) => parse_date(col, s),
            RawValue::Timestamp(ts) => Ok(Value::Date(ts.date_naive())),
            _ => mismatch(col, dst, val),
        },
        TypeKind::Int64 => match val {
            RawValue::Bytes(v) => parse_int(col, &String::from_utf8_lossy(v)),
            RawValue::Text(s) => parse_int(col, s),
            RawValue::Int64(v) => Ok(Value::Int64(*v)),
            RawValue::Float32(v) => Ok(Value::Int64(v.trunc() as i64)),
            RawValue::Float64(v) => Ok(Value::Int64(v.trunc() as i64)),
            _ => mismatch(col, dst, val),
        },
        TypeKind::Float32 => match val {
            RawValue::Bytes(v) => parse_float32(col, &String::from_utf8_lossy(v)),
            RawValue::Text(s) => parse_float32(col, s),
            RawValue::Int64(v) => Ok(Value::Float32(*v as f32)),
            RawValue::Float32(v) => Ok(Value::Float32(*v)),
            RawValue::Float64(v) => Ok(Value::Float32(*v as f32)),
            _ => mismatch(col, dst, val),
        },
        TypeKind::Float64 => match val {
            RawValue::Bytes(v) => parse_float64(col, &String::from_utf8_lossy(v)),
            RawValue::Text(s) => parse_float64(col, s),
            RawValue::Int64(v) => Ok(Value::Float64(*v as f64)),
            RawValue::Float32(v) => Ok(Value::Float64(*v as f64)),
            RawValue::Float64(v) => Ok(Value::Float64(*v)),
            _ => mismatch(col, dst, val),
        },
        TypeKind::Numeric => match val {
            // Exact decimal parse; never routed through floating point.
            RawValue::Bytes(v) => parse_numeric(col, &String::from_utf8_lossy(v)),
            RawValue::Text(s) => parse_numeric(col, s),
            _ => mismatch(col, dst, val),
        },
        TypeKind::String => match val {
            RawValue::Bool(v) => Ok(Value::String(v.to_string())),
            RawValue::Bytes(v) => Ok(Value::String(String::from_utf8_lossy(v).into_owned())),
            RawValue::Int64(v) => Ok(Value::String(v.to_string())),
            RawValue::Float32(v) => Ok(Value::String(v.to_string())),
            RawValue::Float64(v) => Ok(Value::String(v.to_string())),
            RawValue::Text(s) => Ok(Value::String(s.clone())),
            RawValue::Timestamp(ts) => Ok(Value::String(ts.to_rfc3339())),
            _ => mismatch(col, dst, val),
        },
        TypeKind::Timestamp => match val {
            RawValue::Text(s) => parse_timestamp(col, src_type, tz, s),
            RawValue::Timestamp(ts) => Ok(Value::Timestamp(*ts)),
            _ => mismatch(col, dst, val),
        },
    }
}

fn mismatch(col: &str, dst: TypeKind, val: &RawValue) -> Result<Value> {
    Err(MigrateError::convert(
        col,
        format!("can't convert {} value to {dst}", val.kind()),
    ))
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("t") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") || s.eq_ignore_ascii_case("f") {
        Some(false)
    } else {
        None
    }
}

fn parse_date(col: &str, s: &str) -> Result<Value> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(Value::Date)
        .map_err(|e| MigrateError::convert(col, format!("can't parse '{s}' as date: {e}")))
}

fn parse_int(col: &str, s: &str) -> Result<Value> {
    s.trim()
        .parse::<i64>()
        .map(Value::Int64)
        .map_err(|e| MigrateError::convert(col, format!("can't parse '{s}' as int64: {e}")))
}

fn parse_float32(col: &str, s: &str) -> Result<Value> {
    s.trim()
        .parse::<f32>()
        .map(Value::Float32)
        .map_err(|e| MigrateError::convert(col, format!("can't parse '{s}' as float32: {e}")))
}

fn parse_float64(col: &str, s: &str) -> Result<Value> {
    s.trim()
        .parse::<f64>()
        .map(Value::Float64)
        .map_err(|e| MigrateError::convert(col, format!("can't parse '{s}' as float64: {e}")))
}

fn parse_numeric(col: &str, s: &str) -> Result<Value> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map(Value::Numeric)
        .map_err(|e| MigrateError::convert(col, format!("can't parse '{s}' as numeric: {e}")))
}

/// Parse timestamp text. Zoned source types carry their own offset in the
/// text; unzoned ones are interpreted in the configured default offset.
fn parse_timestamp(col: &str, src_type: &str, tz: FixedOffset, s: &str) -> Result<Value> {
    let zoned = matches!(src_type, "timestamptz" | "timestamp with time zone");
    if zoned {
        for fmt in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
            if let Ok(ts) = DateTime::parse_from_str(s, fmt) {
                return Ok(Value::Timestamp(ts));
            }
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return Ok(Value::Timestamp(ts));
        }
    } else {
        for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                if let Some(ts) = tz.from_local_datetime(&naive).single() {
                    return Ok(Value::Timestamp(ts));
                }
            }
        }
    }
    Err(MigrateError::convert(
        col,
        format!("can't parse '{s}' as timestamp (source type {src_type})"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn conv(dst: TypeKind, src_type: &str, val: RawValue) -> Result<Value> {
        convert_scalar("c", dst, src_type, utc(), &val)
    }

    #[test]
    fn test_bool_conversions() {
        assert_eq!(
            conv(TypeKind::Bool, "boolean", RawValue::Bool(true)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            conv(TypeKind::Bool, "boolean", "TRUE".into()).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            conv(TypeKind::Bool, "boolean", "f".into()).unwrap(),
            Value::Bool(false)
        );
        assert!(conv(TypeKind::Bool, "boolean", RawValue::Int64(1)).is_err());
    }

    #[test]
    fn test_int64_conversions() {
        assert_eq!(
            conv(TypeKind::Int64, "bigint", "42".into()).unwrap(),
            Value::Int64(42)
        );
        assert_eq!(
            conv(TypeKind::Int64, "bigint", RawValue::Bytes(b"-7".to_vec())).unwrap(),
            Value::Int64(-7)
        );
        // Floats truncate toward zero.
        assert_eq!(
            conv(TypeKind::Int64, "bigint", RawValue::Float64(-3.9)).unwrap(),
            Value::Int64(-3)
        );
        assert!(conv(TypeKind::Int64, "bigint", "4.5".into()).is_err());
    }

    #[test]
    fn test_float_conversions() {
        assert_eq!(
            conv(TypeKind::Float64, "double precision", "1.5".into()).unwrap(),
            Value::Float64(1.5)
        );
        assert_eq!(
            conv(TypeKind::Float64, "double precision", RawValue::Int64(3)).unwrap(),
            Value::Float64(3.0)
        );
        assert_eq!(
            conv(TypeKind::Float32, "real", RawValue::Float64(2.5)).unwrap(),
            Value::Float32(2.5)
        );
        assert!(conv(TypeKind::Float64, "double precision", RawValue::Bool(true)).is_err());
    }

    #[test]
    fn test_numeric_exact_parse() {
        let v = conv(TypeKind::Numeric, "numeric", "123456789.000000001".into()).unwrap();
        assert_eq!(
            v,
            Value::Numeric(Decimal::from_str("123456789.000000001").unwrap())
        );
        assert!(conv(TypeKind::Numeric, "numeric", "abc".into()).is_err());
        assert!(conv(TypeKind::Numeric, "numeric", RawValue::Float64(1.0)).is_err());
    }

    #[test]
    fn test_date_conversions() {
        assert_eq!(
            conv(TypeKind::Date, "date", "2024-02-29".into()).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert!(conv(TypeKind::Date, "date", "2023-02-29".into()).is_err());
    }

    #[test]
    fn test_string_canonical_forms() {
        assert_eq!(
            conv(TypeKind::String, "text", RawValue::Bool(false)).unwrap(),
            Value::String("false".into())
        );
        assert_eq!(
            conv(TypeKind::String, "text", RawValue::Int64(9)).unwrap(),
            Value::String("9".into())
        );
        assert_eq!(
            conv(TypeKind::String, "text", RawValue::Bytes(b"hi".to_vec())).unwrap(),
            Value::String("hi".into())
        );
    }

    #[test]
    fn test_timestamp_zoned_text() {
        let v = conv(
            TypeKind::Timestamp,
            "timestamptz",
            "2021-06-01 10:30:00+05:30".into(),
        )
        .unwrap();
        let Value::Timestamp(ts) = v else {
            panic!("expected timestamp")
        };
        assert_eq!(ts.offset().local_minus_utc(), 5 * 3600 + 1800);
        assert_eq!(ts.hour(), 10);
    }

    #[test]
    fn test_timestamp_unzoned_uses_default_offset() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let v = convert_scalar(
            "c",
            TypeKind::Timestamp,
            "timestamp",
            tz,
            &"2021-06-01 10:30:00.25".into(),
        )
        .unwrap();
        let Value::Timestamp(ts) = v else {
            panic!("expected timestamp")
        };
        assert_eq!(ts.offset().local_minus_utc(), 2 * 3600);
        assert_eq!(ts.hour(), 10);
    }
}
