//! Source database implementations of [`SourceReader`](crate::core::SourceReader).

pub mod postgres;

pub use postgres::PgSource;
