//! Source-side schema model.
//!
//! These types are a normalized, engine-independent representation of what
//! the catalog reader discovers. Tables are immutable after the schema pass;
//! only issue annotations (kept in the [`crate::report::Report`]) accrue later.
//!
//! Source columns and target columns are separate objects joined by a shared
//! column id, which is the stable key across the schema and data passes.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical source type descriptor.
///
/// `mods` holds declared length or (precision, scale); `array_bounds` is
/// `[-1]` for a single unbounded array dimension (multi-dimensional arrays
/// are not modeled distinctly).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Type {
    /// Base type name as declared in the catalog (element type for arrays).
    pub name: String,

    /// Length, or precision/scale modifiers.
    pub mods: Vec<i64>,

    /// Array bounds; empty for scalars.
    pub array_bounds: Vec<i64>,
}

impl Type {
    pub fn is_array(&self) -> bool {
        !self.array_bounds.is_empty()
    }
}

/// Constraints observed on a column that are dropped rather than translated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ignored {
    /// Column has a CHECK constraint.
    pub check: bool,

    /// Column has a default value.
    pub default: bool,
}

/// Source column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Stable internal id (shared with the target-side column).
    pub id: String,

    /// Column name.
    pub name: String,

    /// Canonical type descriptor.
    pub ty: Type,

    /// Whether the column is declared NOT NULL.
    pub not_null: bool,

    /// Constraints recorded but not mirrored on the target.
    pub ignored: Ignored,
}

/// ON DELETE / ON UPDATE referential action (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Cascade,
    SetNull,
    Restrict,
}

impl FromStr for ReferentialAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_uppercase().as_str() {
            "NO ACTION" | "NO_ACTION" => Ok(ReferentialAction::NoAction),
            "CASCADE" => Ok(ReferentialAction::Cascade),
            "SET NULL" | "SET_NULL" => Ok(ReferentialAction::SetNull),
            "RESTRICT" => Ok(ReferentialAction::Restrict),
            other => Err(format!("unrecognized referential action '{other}'")),
        }
    }
}

/// Foreign key constraint.
///
/// Multi-column keys preserve column order exactly as declared; rows sharing
/// a constraint name are merged in row-arrival order by the schema builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Stable internal id.
    pub id: String,

    /// Constraint name.
    pub name: String,

    /// Local column ids, in declared order.
    pub col_ids: Vec<String>,

    /// Referenced table display name.
    pub refer_table: String,

    /// Referenced table id, resolved after all tables are built.
    pub refer_table_id: Option<String>,

    /// Referenced column names, in declared order (same length as `col_ids`).
    pub refer_columns: Vec<String>,

    /// Referenced column ids, resolved after all tables are built.
    pub refer_col_ids: Vec<String>,

    /// ON DELETE action.
    pub on_delete: ReferentialAction,

    /// ON UPDATE action.
    pub on_update: ReferentialAction,
}

/// One key column of an index with its sort direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexKey {
    /// Column id.
    pub col_id: String,

    /// True for DESC columns.
    pub desc: bool,
}

/// Secondary index metadata. Primary-key-backing indexes are excluded;
/// primary keys are modeled separately on [`Table`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    /// Stable internal id.
    pub id: String,

    /// Index name.
    pub name: String,

    /// Whether the index is unique.
    pub unique: bool,

    /// Key columns in catalog declaration order; never empty.
    pub keys: Vec<IndexKey>,
}

/// Source table metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Stable internal id.
    pub id: String,

    /// Display name (qualified with the namespace only when the catalog
    /// spans more than one namespace).
    pub name: String,

    /// Source namespace (schema) the table lives in.
    pub schema: String,

    /// Column ids in catalog ordinal order.
    pub col_ids: Vec<String>,

    /// Column definitions keyed by column id.
    pub col_defs: HashMap<String, Column>,

    /// Primary key column ids, ordinal position ascending.
    pub primary_keys: Vec<String>,

    /// Foreign keys, sorted by constraint name.
    pub foreign_keys: Vec<ForeignKey>,

    /// Secondary indexes in first-seen catalog order.
    pub indexes: Vec<Index>,

    /// Approximate row count, for reporting.
    pub row_count: i64,
}

impl Table {
    /// Look up a column id by source column name.
    pub fn col_id_by_name(&self, name: &str) -> Option<&String> {
        self.col_ids
            .iter()
            .find(|id| self.col_defs.get(*id).map(|c| c.name.as_str()) == Some(name))
    }

    /// Map from source column name to column id.
    pub fn col_name_id_map(&self) -> HashMap<String, String> {
        self.col_ids
            .iter()
            .filter_map(|id| {
                self.col_defs
                    .get(id)
                    .map(|c| (c.name.clone(), id.clone()))
            })
            .collect()
    }

    pub fn has_pk(&self) -> bool {
        !self.primary_keys.is_empty()
    }
}
