//! Core traits for source access and row emission.
//!
//! - [`SourceReader`]: catalog queries and cancellable row streaming
//! - [`RowSink`]: accepts converted rows, one call per row in cursor order
//! - [`SchemaWriter`], [`ChangeStreamOrchestrator`]: external collaborators
//!   that consume the finished model (implemented outside this crate)
//!
//! Catalog methods return *raw* rows with no semantic interpretation; the
//! schema builder turns them into the normalized model.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

use super::ddl::CreateTable;
use super::schema::Table;
use super::value::{RawRow, Value};

/// Table identity as enumerated from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    /// Source namespace (schema).
    pub schema: String,
    /// Unqualified table name.
    pub name: String,
}

/// Raw column metadata row.
#[derive(Debug, Clone)]
pub struct RawColumnRow {
    pub name: String,
    pub data_type: String,
    /// Element type for ARRAY-kind columns.
    pub element_type: Option<String>,
    pub is_nullable: bool,
    pub has_default: bool,
    pub char_max_len: Option<i64>,
    pub numeric_precision: Option<i64>,
    pub numeric_scale: Option<i64>,
}

/// Raw constraint row, keyed by column name. `kind` is the catalog's
/// constraint type string (PRIMARY KEY / FOREIGN KEY / UNIQUE / CHECK);
/// the builder treats anything malformed as an anomaly.
#[derive(Debug, Clone)]
pub struct RawConstraintRow {
    pub column: String,
    pub kind: String,
}

/// Raw foreign-key row; one row per (constraint, column) pair.
#[derive(Debug, Clone)]
pub struct RawForeignKeyRow {
    pub constraint: String,
    pub column: String,
    pub refer_schema: String,
    pub refer_table: String,
    pub refer_column: String,
    pub on_delete: String,
    pub on_update: String,
}

/// Raw index row; one row per (index, column) pair. Indexes backing a
/// primary key are excluded at query time.
#[derive(Debug, Clone)]
pub struct RawIndexRow {
    pub name: String,
    pub column: String,
    /// 1-based position of the column within the index.
    pub position: i64,
    pub unique: bool,
    /// "ASC" or "DESC".
    pub order: String,
}

/// A streaming cursor over a table's rows.
///
/// `columns` are the source column names of the active result set, in
/// result order. `rows` yields scanned rows until the table is exhausted;
/// the bounded channel provides backpressure.
pub struct RowCursor {
    pub columns: Vec<String>,
    pub rows: mpsc::Receiver<Result<RawRow>>,
}

/// Read catalog metadata and stream rows from a source database.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// List base tables, excluding system/internal namespaces.
    async fn list_tables(&self) -> Result<Vec<TableRef>>;

    /// Raw column metadata for a table, in ordinal order.
    async fn column_rows(&self, table: &TableRef) -> Result<Vec<RawColumnRow>>;

    /// Raw constraint rows for a table, ordinal position ascending.
    async fn constraint_rows(&self, table: &TableRef) -> Result<Vec<RawConstraintRow>>;

    /// Raw foreign-key rows for a table.
    async fn foreign_key_rows(&self, table: &TableRef) -> Result<Vec<RawForeignKeyRow>>;

    /// Raw index rows for a table, grouped by index, position ascending.
    async fn index_rows(&self, table: &TableRef) -> Result<Vec<RawIndexRow>>;

    /// Row count for a table, for reporting.
    async fn row_count(&self, table: &TableRef) -> Result<i64>;

    /// Start a full scan of a table's rows.
    ///
    /// Scanned values use the raw tagged union; the reader is responsible
    /// for fetching kinds without a slot (numeric, date, arrays) as text.
    /// The scan stops cleanly when `cancel` fires; no partial row is
    /// yielded.
    async fn scan_rows(&self, table: &Table, cancel: CancellationToken) -> Result<RowCursor>;

    /// Source database type identifier (e.g. "postgres").
    fn db_type(&self) -> &str;

    /// Close the underlying connection pool.
    async fn close(&self);
}

/// Accepts converted rows. Called exactly once per successfully converted
/// row, strictly in source cursor order for a given table.
#[async_trait]
pub trait RowSink: Send + Sync {
    async fn write_row(&self, table: &str, cols: &[String], values: Vec<Value>) -> Result<()>;
}

/// Applies the finished target schema model (DDL composition and execution
/// live outside this crate).
#[async_trait]
pub trait SchemaWriter: Send + Sync {
    async fn apply_schema(&self, tables: &[CreateTable]) -> Result<()>;
}

/// A table/column include list derived from the schema model, supplied to
/// the CDC orchestration layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedTable {
    pub table: String,
    pub columns: Vec<String>,
}

/// Provisions change-stream and managed-pipeline resources (external).
#[async_trait]
pub trait ChangeStreamOrchestrator: Send + Sync {
    async fn provision(&self, tables: &[IncludedTable]) -> Result<()>;
}
