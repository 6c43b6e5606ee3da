//! Error types for the conversion library.

use thiserror::Error;

/// Main error type for schema and data conversion operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Catalog extraction failed for a table or the whole catalog
    #[error("Schema extraction failed: {0}")]
    SchemaExtraction(String),

    /// No mapping exists for a source type; caller falls back to STRING(MAX)
    #[error("No valid Spanner mapping for source type '{source_type}'")]
    NoValidMapping { source_type: String },

    /// A column id is missing from the source or target schema.
    /// Fatal for the affected table's data pass.
    #[error("Column id {column} of table {table} is missing from the schema")]
    ColumnMismatch { table: String, column: String },

    /// A single value could not be converted to its target type.
    /// Recorded as a bad row; never fatal for the table.
    #[error("Can't convert value for column {column}: {message}")]
    Convert { column: String, message: String },

    /// Data pass failed for a specific table
    #[error("Data conversion failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// Run was cancelled (SIGINT, caller token, etc.)
    #[error("Migration cancelled")]
    Cancelled,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a per-value conversion error
    pub fn convert(column: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Convert {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
