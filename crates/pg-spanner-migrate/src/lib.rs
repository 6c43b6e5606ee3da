//! # pg-spanner-migrate
//!
//! PostgreSQL to Cloud Spanner schema and data conversion library.
//!
//! This library provides the core functionality for migrating a PostgreSQL
//! database to Spanner:
//!
//! - **Catalog extraction** of tables, columns, constraints, foreign keys,
//!   and indexes into a normalized schema model
//! - **Type mapping** onto the Spanner type system, with schema issues
//!   recorded for every lossy mapping
//! - **Row conversion** streaming every table through a per-value
//!   conversion matrix, isolating bad rows instead of aborting
//! - **Synthetic primary keys** (bit-reversed sequences) for tables that
//!   declare none
//! - **Parallel data pass** with a configurable worker pool and clean
//!   cancellation
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pg_spanner_migrate::{Config, Orchestrator, PgSource, Result, RowSink, Value};
//! use tokio_util::sync::CancellationToken;
//!
//! struct StdoutSink;
//!
//! #[async_trait::async_trait]
//! impl RowSink for StdoutSink {
//!     async fn write_row(&self, table: &str, cols: &[String], values: Vec<Value>) -> Result<()> {
//!         println!("{table}: {cols:?} = {values:?}");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let source = Arc::new(PgSource::connect(&config.source).await?);
//!     let orchestrator = Orchestrator::new(config, source, Arc::new(StdoutSink));
//!     let result = orchestrator.run(CancellationToken::new()).await?;
//!     println!("Converted {} rows", result.rows_converted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod convert;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod schema;
pub mod source;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, ConversionConfig, SourceConfig, TargetConfig};
pub use convert::{RowOutcome, SyntheticKeyState, TableStats};
pub use crate::core::ddl::{ColumnType, CreateTable, TypeKind};
pub use crate::core::issue::SchemaIssue;
pub use crate::core::schema::Table;
pub use crate::core::traits::{
    ChangeStreamOrchestrator, IncludedTable, RowCursor, RowSink, SchemaWriter, SourceReader,
};
pub use crate::core::value::{RawRow, RawValue, Value};
pub use error::{MigrateError, Result};
pub use orchestrator::{MigrationResult, Orchestrator, SchemaModel};
pub use report::Report;
pub use source::PgSource;
pub use typemap::TypeMapper;
