//! Array value conversion.
//!
//! Source arrays arrive as their driver text encoding: a brace-delimited,
//! comma-separated literal where elements may be double-quoted (with
//! backslash escapes) and a bare `NULL` token marks an element-level null.
//! Each parsed element goes through the scalar matrix for the array's
//! element type.

use chrono::FixedOffset;

use crate::core::ddl::ColumnType;
use crate::core::value::{RawValue, Value};
use crate::convert::scalar::convert_scalar;
use crate::error::{MigrateError, Result};

/// Convert an array literal to an array value. `dst` is the array column's
/// type (element kind within); `src_type` is the element's source type name.
pub fn convert_array(
    col: &str,
    dst: &ColumnType,
    src_type: &str,
    tz: FixedOffset,
    literal: &str,
) -> Result<Value> {
    let elements = parse_array_literal(col, literal)?;
    let mut out = Vec::with_capacity(elements.len());
    for element in elements {
        match element {
            None => out.push(None),
            Some(text) => {
                let v = convert_scalar(col, dst.kind, src_type, tz, &RawValue::Text(text))?;
                out.push(Some(v));
            }
        }
    }
    Ok(Value::Array(out))
}

/// Split a brace-delimited array literal into element texts; `None` marks a
/// null element. Only single-dimension literals are handled, matching the
/// single-bound array model.
fn parse_array_literal(col: &str, literal: &str) -> Result<Vec<Option<String>>> {
    let s = literal.trim();
    let inner = s
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| {
            MigrateError::convert(col, format!("malformed array literal '{literal}'"))
        })?;
    if inner.is_empty() {
        return Ok(Vec::new());
    }

    let mut elements = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' if !in_quotes => {
                in_quotes = true;
                quoted = true;
            }
            '"' if in_quotes => in_quotes = false,
            '\\' if in_quotes => {
                let Some(escaped) = chars.next() else {
                    return Err(MigrateError::convert(
                        col,
                        format!("dangling escape in array literal '{literal}'"),
                    ));
                };
                current.push(escaped);
            }
            ',' if !in_quotes => {
                elements.push(finish_element(&mut current, &mut quoted));
            }
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err(MigrateError::convert(
            col,
            format!("unterminated quote in array literal '{literal}'"),
        ));
    }
    elements.push(finish_element(&mut current, &mut quoted));
    Ok(elements)
}

fn finish_element(current: &mut String, quoted: &mut bool) -> Option<String> {
    let text = std::mem::take(current);
    let was_quoted = std::mem::take(quoted);
    // An unquoted bare NULL token is an element-level null; a quoted "NULL"
    // is the literal string.
    if !was_quoted && text == "NULL" {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ddl::TypeKind;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn int_array() -> ColumnType {
        ColumnType::scalar(TypeKind::Int64).as_array()
    }

    fn string_array() -> ColumnType {
        ColumnType::max(TypeKind::String).as_array()
    }

    #[test]
    fn test_int_array() {
        let v = convert_array("c", &int_array(), "bigint", utc(), "{1,2,3}").unwrap();
        assert_eq!(
            v,
            Value::Array(vec![
                Some(Value::Int64(1)),
                Some(Value::Int64(2)),
                Some(Value::Int64(3))
            ])
        );
    }

    #[test]
    fn test_null_elements() {
        let v = convert_array("c", &int_array(), "bigint", utc(), "{1,NULL,3}").unwrap();
        assert_eq!(
            v,
            Value::Array(vec![Some(Value::Int64(1)), None, Some(Value::Int64(3))])
        );
    }

    #[test]
    fn test_quoted_elements_with_escapes() {
        let v = convert_array(
            "c",
            &string_array(),
            "text",
            utc(),
            r#"{"a,b","say \"hi\"",plain}"#,
        )
        .unwrap();
        assert_eq!(
            v,
            Value::Array(vec![
                Some(Value::String("a,b".into())),
                Some(Value::String("say \"hi\"".into())),
                Some(Value::String("plain".into()))
            ])
        );
    }

    #[test]
    fn test_quoted_null_is_a_string() {
        let v = convert_array("c", &string_array(), "text", utc(), r#"{"NULL",NULL}"#).unwrap();
        assert_eq!(
            v,
            Value::Array(vec![Some(Value::String("NULL".into())), None])
        );
    }

    #[test]
    fn test_empty_array() {
        let v = convert_array("c", &int_array(), "bigint", utc(), "{}").unwrap();
        assert_eq!(v, Value::Array(Vec::new()));
    }

    #[test]
    fn test_malformed_literals() {
        assert!(convert_array("c", &int_array(), "bigint", utc(), "1,2,3").is_err());
        assert!(convert_array("c", &int_array(), "bigint", utc(), "{1,x}").is_err());
        assert!(convert_array("c", &string_array(), "text", utc(), "{\"open}").is_err());
    }
}
