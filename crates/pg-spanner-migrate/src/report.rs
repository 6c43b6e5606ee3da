//! Run-level reporting: schema issues, anomalies, and bad-row accounting.
//!
//! Everything recorded here is retrievable after a run completes, even when
//! the run itself "succeeded". Nothing here drives control flow.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;
use tracing::warn;

use crate::core::issue::SchemaIssue;

/// A retained sample of a raw row that failed scan or conversion.
#[derive(Debug, Clone, Serialize)]
pub struct BadRowSample {
    pub cols: Vec<String>,
    pub vals: Vec<String>,
}

/// Bad-row accounting for one table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BadRows {
    /// Total rows skipped for this table.
    pub count: i64,

    /// Bounded sample of the raw rows, for diagnostics.
    pub samples: Vec<BadRowSample>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Free-text anomaly message -> occurrence count.
    anomalies: BTreeMap<String, u64>,

    /// Table display name -> bad-row stats.
    bad_rows: BTreeMap<String, BadRows>,

    /// Table id -> column id -> issues.
    issues: BTreeMap<String, BTreeMap<String, Vec<SchemaIssue>>>,
}

/// Shared reporter for a conversion run.
#[derive(Debug)]
pub struct Report {
    bad_row_limit: usize,
    inner: Mutex<Inner>,
}

impl Report {
    pub fn new(bad_row_limit: usize) -> Self {
        Self {
            bad_row_limit,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Record an unexpected condition (malformed catalog row, row error).
    pub fn anomaly(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        let mut inner = self.inner.lock().unwrap();
        *inner.anomalies.entry(message).or_insert(0) += 1;
    }

    /// Increment the bad-row counter for a table.
    pub fn add_bad_row(&self, table: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.bad_rows.entry(table.to_string()).or_default().count += 1;
    }

    /// Retain a raw-row sample for a table, up to the configured bound.
    pub fn collect_bad_row(&self, table: &str, cols: &[String], vals: Vec<String>) {
        let mut inner = self.inner.lock().unwrap();
        let stats = inner.bad_rows.entry(table.to_string()).or_default();
        if stats.samples.len() < self.bad_row_limit {
            stats.samples.push(BadRowSample {
                cols: cols.to_vec(),
                vals,
            });
        }
    }

    /// Attach a schema issue to a column.
    pub fn add_issue(&self, table_id: &str, col_id: &str, issue: SchemaIssue) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .issues
            .entry(table_id.to_string())
            .or_default()
            .entry(col_id.to_string())
            .or_default()
            .push(issue);
    }

    /// Attach several issues to a column.
    pub fn add_issues(&self, table_id: &str, col_id: &str, issues: &[SchemaIssue]) {
        for issue in issues {
            self.add_issue(table_id, col_id, *issue);
        }
    }

    /// Bad-row counts per table.
    pub fn bad_row_counts(&self) -> BTreeMap<String, i64> {
        let inner = self.inner.lock().unwrap();
        inner
            .bad_rows
            .iter()
            .map(|(t, s)| (t.clone(), s.count))
            .collect()
    }

    /// Bad-row stats (count + samples) for one table.
    pub fn bad_rows(&self, table: &str) -> Option<BadRows> {
        let inner = self.inner.lock().unwrap();
        inner.bad_rows.get(table).cloned()
    }

    /// All recorded issues, per table id and column id.
    pub fn issues(&self) -> BTreeMap<String, BTreeMap<String, Vec<SchemaIssue>>> {
        let inner = self.inner.lock().unwrap();
        inner.issues.clone()
    }

    /// Issues recorded for one column.
    pub fn column_issues(&self, table_id: &str, col_id: &str) -> Vec<SchemaIssue> {
        let inner = self.inner.lock().unwrap();
        inner
            .issues
            .get(table_id)
            .and_then(|cols| cols.get(col_id))
            .cloned()
            .unwrap_or_default()
    }

    /// Anomaly messages with occurrence counts.
    pub fn anomalies(&self) -> BTreeMap<String, u64> {
        let inner = self.inner.lock().unwrap();
        inner.anomalies.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_row_accounting() {
        let report = Report::new(2);
        let cols = vec!["id".to_string(), "name".to_string()];

        for i in 0..5 {
            report.add_bad_row("users");
            report.collect_bad_row("users", &cols, vec![i.to_string(), "x".to_string()]);
        }

        let stats = report.bad_rows("users").unwrap();
        assert_eq!(stats.count, 5);
        // Samples are bounded by the configured limit.
        assert_eq!(stats.samples.len(), 2);
        assert_eq!(report.bad_row_counts().get("users"), Some(&5));
        assert!(report.bad_rows("orders").is_none());
    }

    #[test]
    fn test_issue_recording() {
        let report = Report::new(10);
        report.add_issue("t1", "c1", SchemaIssue::Widened);
        report.add_issue("t1", "c1", SchemaIssue::DefaultValueDropped);
        report.add_issue("t1", "c2", SchemaIssue::TimestampPrecisionLoss);

        assert_eq!(
            report.column_issues("t1", "c1"),
            vec![SchemaIssue::Widened, SchemaIssue::DefaultValueDropped]
        );
        assert_eq!(report.issues().get("t1").unwrap().len(), 2);
    }

    #[test]
    fn test_anomaly_counts() {
        let report = Report::new(10);
        report.anomaly("Can't scan: bad row");
        report.anomaly("Can't scan: bad row");
        assert_eq!(report.anomalies().get("Can't scan: bad row"), Some(&2));
    }
}
