//! Schema issues: user-visible notes about lossy or dropped mappings.
//!
//! Issues are attached to column ids during the schema pass and reported
//! after a run. They never drive control flow.

use serde::{Deserialize, Serialize};

/// A note that a type or constraint mapping is lossy or unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaIssue {
    /// Integer narrower than 64 bits widened to INT64.
    Widened,

    /// Array column where the target's array support is unavailable.
    ArrayTypeNotSupported,

    /// Column default exists on the source but is not ported.
    DefaultValueDropped,

    /// Timestamp without time zone: local-vs-UTC semantics differ.
    TimestampPrecisionLoss,

    /// CHECK constraint on the column is dropped, not translated.
    CheckConstraintDropped,

    /// Source type had no mapping; STRING(MAX) fallback was used.
    NoGoodType,
}

impl SchemaIssue {
    /// Human-readable description for reports.
    pub fn description(&self) -> &'static str {
        match self {
            SchemaIssue::Widened => "column widened to INT64",
            SchemaIssue::ArrayTypeNotSupported => "array type not supported on target",
            SchemaIssue::DefaultValueDropped => "column default value dropped",
            SchemaIssue::TimestampPrecisionLoss => {
                "timestamp without time zone: semantics differ on target"
            }
            SchemaIssue::CheckConstraintDropped => "CHECK constraint dropped",
            SchemaIssue::NoGoodType => "no good Spanner type; STRING(MAX) used",
        }
    }
}
