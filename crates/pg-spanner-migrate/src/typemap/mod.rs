//! Source-to-target type mapping.
//!
//! A pure decision table from canonical source type descriptors to target
//! column types, recording a [`SchemaIssue`] whenever the mapping loses
//! information. Unrecognized types fail with `NoValidMapping`; the
//! column-level wrapper degrades those to `STRING(MAX)` so a single odd
//! column never blocks a table.

use crate::core::ddl::{ColumnType, TypeKind};
use crate::core::issue::SchemaIssue;
use crate::core::schema::{Column, Type};
use crate::error::{MigrateError, Result};

/// Maps canonical source types to target types.
#[derive(Debug, Clone, Copy)]
pub struct TypeMapper {
    /// Whether the target deployment supports array columns. When false,
    /// array columns still map (element type + array flag) but carry an
    /// `ArrayTypeNotSupported` issue.
    pub array_support: bool,
}

impl TypeMapper {
    pub fn new(array_support: bool) -> Self {
        Self { array_support }
    }

    /// Map one source type descriptor. Array types map their element type
    /// recursively and set the array flag on the result.
    pub fn map_type(&self, ty: &Type) -> Result<(ColumnType, Vec<SchemaIssue>)> {
        if ty.is_array() {
            let element = Type {
                name: ty.name.clone(),
                mods: ty.mods.clone(),
                array_bounds: Vec::new(),
            };
            let (mapped, mut issues) = self.map_scalar(&element)?;
            if !self.array_support {
                issues.push(SchemaIssue::ArrayTypeNotSupported);
            }
            return Ok((mapped.as_array(), issues));
        }
        self.map_scalar(ty)
    }

    fn map_scalar(&self, ty: &Type) -> Result<(ColumnType, Vec<SchemaIssue>)> {
        let (kind, len, issues): (TypeKind, Option<i64>, Vec<SchemaIssue>) = match ty.name.as_str()
        {
            "bool" | "boolean" => (TypeKind::Bool, None, vec![]),
            "bigint" | "int8" | "bigserial" => (TypeKind::Int64, None, vec![]),
            "integer" | "int" | "int4" | "serial" => {
                (TypeKind::Int64, None, vec![SchemaIssue::Widened])
            }
            "smallint" | "int2" | "smallserial" => {
                (TypeKind::Int64, None, vec![SchemaIssue::Widened])
            }
            "bytea" => (TypeKind::Bytes, None, vec![]),
            "real" | "float4" => (TypeKind::Float32, None, vec![]),
            "double precision" | "float8" => (TypeKind::Float64, None, vec![]),
            // Generic float width arrives as a precision modifier.
            "float" => {
                let kind = match ty.mods.first() {
                    Some(p) if *p <= 24 => TypeKind::Float32,
                    _ => TypeKind::Float64,
                };
                (kind, None, vec![])
            }
            "numeric" | "decimal" => (TypeKind::Numeric, None, vec![]),
            "date" => (TypeKind::Date, None, vec![]),
            "timestamp with time zone" | "timestamptz" => (TypeKind::Timestamp, None, vec![]),
            "timestamp without time zone" | "timestamp" => (
                TypeKind::Timestamp,
                None,
                vec![SchemaIssue::TimestampPrecisionLoss],
            ),
            "text" => (TypeKind::String, None, vec![]),
            "character varying" | "varchar" | "character" | "char" | "bpchar" => {
                (TypeKind::String, ty.mods.first().copied(), vec![])
            }
            _ => {
                return Err(MigrateError::NoValidMapping {
                    source_type: ty.name.clone(),
                })
            }
        };

        let mapped = match (kind, len) {
            (TypeKind::String, Some(n)) => ColumnType::sized(TypeKind::String, n),
            (TypeKind::String, None) => ColumnType::max(TypeKind::String),
            (TypeKind::Bytes, _) => ColumnType::max(TypeKind::Bytes),
            (kind, _) => ColumnType::scalar(kind),
        };
        Ok((mapped, issues))
    }

    /// Map a whole column, folding in the issues implied by its ignored
    /// constraint flags and degrading unmappable types to a `STRING(MAX)`
    /// fallback instead of failing.
    pub fn map_column(&self, col: &Column) -> (ColumnType, Vec<SchemaIssue>) {
        let (mapped, mut issues) = match self.map_type(&col.ty) {
            Ok(ok) => ok,
            Err(_) => {
                let fallback = if col.ty.is_array() {
                    ColumnType::max(TypeKind::String).as_array()
                } else {
                    ColumnType::max(TypeKind::String)
                };
                (fallback, vec![SchemaIssue::NoGoodType])
            }
        };
        if col.ignored.default {
            issues.push(SchemaIssue::DefaultValueDropped);
        }
        if col.ignored.check {
            issues.push(SchemaIssue::CheckConstraintDropped);
        }
        (mapped, issues)
    }
}
