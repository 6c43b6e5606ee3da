//! Core abstractions for cross-database schema and data conversion.
//!
//! - [`schema`]: normalized source-side model (tables, columns, keys, indexes)
//! - [`ddl`]: target-side (Spanner) model
//! - [`value`]: raw driver slots and converted target values
//! - [`issue`]: lossy-mapping annotations
//! - [`ids`]: stable id generation shared across both passes
//! - [`traits`]: source, sink, and external-collaborator seams

pub mod ddl;
pub mod ids;
pub mod issue;
pub mod schema;
pub mod traits;
pub mod value;

pub use ddl::{ColumnDef, ColumnType, CreateTable, TypeKind, MAX_LENGTH};
pub use ids::IdGenerator;
pub use issue::SchemaIssue;
pub use schema::{Column, ForeignKey, Ignored, Index, IndexKey, ReferentialAction, Table, Type};
pub use traits::{
    ChangeStreamOrchestrator, IncludedTable, RawColumnRow, RawConstraintRow, RawForeignKeyRow,
    RawIndexRow, RowCursor, RowSink, SchemaWriter, SourceReader, TableRef,
};
pub use value::{RawRow, RawValue, Value};
