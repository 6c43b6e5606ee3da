//! Target-side (Spanner) schema model.
//!
//! The core does not compose DDL text beyond rendering type names; it supplies
//! this normalized model to the external schema writer.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Length sentinel meaning "maximum length" (STRING(MAX), BYTES(MAX)).
pub const MAX_LENGTH: i64 = -1;

/// Closed set of target scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Bool,
    Bytes,
    Date,
    Float32,
    Float64,
    Int64,
    Numeric,
    String,
    Timestamp,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TypeKind::Bool => "BOOL",
            TypeKind::Bytes => "BYTES",
            TypeKind::Date => "DATE",
            TypeKind::Float32 => "FLOAT32",
            TypeKind::Float64 => "FLOAT64",
            TypeKind::Int64 => "INT64",
            TypeKind::Numeric => "NUMERIC",
            TypeKind::String => "STRING",
            TypeKind::Timestamp => "TIMESTAMP",
        };
        f.write_str(s)
    }
}

/// Target column type: scalar kind, optional length, array flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnType {
    pub kind: TypeKind,

    /// Declared length for STRING/BYTES; [`MAX_LENGTH`] for MAX.
    pub len: Option<i64>,

    pub is_array: bool,
}

impl ColumnType {
    pub fn scalar(kind: TypeKind) -> Self {
        Self {
            kind,
            len: None,
            is_array: false,
        }
    }

    pub fn sized(kind: TypeKind, len: i64) -> Self {
        Self {
            kind,
            len: Some(len),
            is_array: false,
        }
    }

    pub fn max(kind: TypeKind) -> Self {
        Self::sized(kind, MAX_LENGTH)
    }

    pub fn as_array(mut self) -> Self {
        self.is_array = true;
        self
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.len {
            Some(MAX_LENGTH) => format!("{}(MAX)", self.kind),
            Some(n) => format!("{}({})", self.kind, n),
            None => self.kind.to_string(),
        };
        if self.is_array {
            write!(f, "ARRAY<{base}>")
        } else {
            f.write_str(&base)
        }
    }
}

/// Target column definition, joined to its source column by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Stable internal id (shared with the source-side column).
    pub id: String,

    /// Target column name.
    pub name: String,

    /// Target type.
    pub ty: ColumnType,

    /// Whether the column is NOT NULL on the target.
    pub not_null: bool,
}

/// Target table definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTable {
    /// Stable internal id (same as the source table's id).
    pub id: String,

    /// Target table name.
    pub name: String,

    /// Column ids in target column order. A synthetic key, if injected,
    /// is the last entry.
    pub col_ids: Vec<String>,

    /// Column definitions keyed by column id.
    pub col_defs: HashMap<String, ColumnDef>,

    /// Primary key column ids in order.
    pub primary_keys: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_rendering() {
        assert_eq!(ColumnType::scalar(TypeKind::Int64).to_string(), "INT64");
        assert_eq!(
            ColumnType::sized(TypeKind::String, 8).to_string(),
            "STRING(8)"
        );
        assert_eq!(ColumnType::max(TypeKind::Bytes).to_string(), "BYTES(MAX)");
        assert_eq!(
            ColumnType::scalar(TypeKind::Float64).as_array().to_string(),
            "ARRAY<FLOAT64>"
        );
    }
}
