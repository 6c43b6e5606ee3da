//! Stable internal id generation for schema objects.
//!
//! Ids join the source-side and target-side schema representations and stay
//! valid across the schema pass and the data pass, so they must be unique
//! for the whole run. One generator is shared by everything that creates
//! schema objects.

use std::sync::atomic::{AtomicU64, Ordering};

/// Generates unique ids for tables, columns, foreign keys, and indexes.
#[derive(Debug, Default)]
pub struct IdGenerator {
    tables: AtomicU64,
    columns: AtomicU64,
    foreign_keys: AtomicU64,
    indexes: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_id(&self) -> String {
        format!("t{}", self.tables.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn column_id(&self) -> String {
        format!("c{}", self.columns.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn foreign_key_id(&self) -> String {
        format!("f{}", self.foreign_keys.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn index_id(&self) -> String {
        format!("i{}", self.indexes.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
