//! Row conversion engine.
//!
//! Streams one table's rows through the scalar/array converters and emits
//! the successful ones to the sink. Per-row failures become a tagged
//! `Skipped` outcome that the driving loop counts and samples; only a
//! column-set mismatch aborts the table.

use chrono::FixedOffset;
use tracing::{debug, warn};

use crate::convert::array::convert_array;
use crate::convert::scalar::convert_scalar;
use crate::convert::synth::SyntheticKeyState;
use crate::core::ddl::{ColumnType, CreateTable};
use crate::core::schema::Table;
use crate::core::traits::{RowCursor, RowSink};
use crate::core::value::{RawRow, RawValue, Value};
use crate::error::{MigrateError, Result};
use crate::report::Report;

/// Result of converting one row. The driving loop owns the skip policy:
/// counting, sampling, and carrying on.
#[derive(Debug)]
pub enum RowOutcome {
    Converted { cols: Vec<String>, values: Vec<Value> },
    Skipped { reason: String },
}

/// Per-table data pass totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    pub rows_written: u64,
    pub bad_rows: u64,
}

/// One target column's conversion plan, resolved against the cursor.
#[derive(Debug)]
struct ColumnPlan {
    name: String,
    src_idx: usize,
    src_type: String,
    dst: ColumnType,
}

/// Converts one table's rows. Holds the resolved column plan and the
/// table's synthetic key state, if any; a table is converted end-to-end by
/// a single converter so the key sequence needs no synchronization.
#[derive(Debug)]
pub struct RowConverter {
    table: String,
    plan: Vec<ColumnPlan>,
    tz: FixedOffset,
    synth: Option<SyntheticKeyState>,
}

impl RowConverter {
    /// Resolve target columns against the source schema and the cursor's
    /// column list. A column id present in only one schema, or a source
    /// column missing from the cursor, is a mismatch fatal to this table.
    pub fn new(
        source: &Table,
        target: &CreateTable,
        cursor_columns: &[String],
        tz: FixedOffset,
        synth: Option<SyntheticKeyState>,
    ) -> Result<Self> {
        let mut plan = Vec::with_capacity(target.col_ids.len());
        for col_id in &target.col_ids {
            if synth.as_ref().is_some_and(|s| &s.col_id == col_id) {
                continue;
            }
            let target_col =
                target
                    .col_defs
                    .get(col_id)
                    .ok_or_else(|| MigrateError::ColumnMismatch {
                        table: source.name.clone(),
                        column: col_id.clone(),
                    })?;
            let source_col =
                source
                    .col_defs
                    .get(col_id)
                    .ok_or_else(|| MigrateError::ColumnMismatch {
                        table: source.name.clone(),
                        column: col_id.clone(),
                    })?;
            let src_idx = cursor_columns
                .iter()
                .position(|c| c == &source_col.name)
                .ok_or_else(|| MigrateError::ColumnMismatch {
                    table: source.name.clone(),
                    column: col_id.clone(),
                })?;
            plan.push(ColumnPlan {
                name: target_col.name.clone(),
                src_idx,
                src_type: source_col.ty.name.clone(),
                dst: target_col.ty,
            });
        }
        Ok(Self {
            table: source.name.clone(),
            plan,
            tz,
            synth,
        })
    }

    /// Convert one row. NULL source values are omitted from the emitted
    /// column list entirely. The synthetic key, when present, is appended
    /// last and its sequence advances only on this success path.
    pub fn convert_row(&mut self, row: &RawRow) -> Result<RowOutcome> {
        let mut cols = Vec::with_capacity(self.plan.len() + 1);
        let mut values = Vec::with_capacity(self.plan.len() + 1);

        for p in &self.plan {
            let raw = row.values.get(p.src_idx).ok_or_else(|| {
                MigrateError::transfer(
                    &self.table,
                    format!("row has {} values, need index {}", row.values.len(), p.src_idx),
                )
            })?;
            if raw.is_null() {
                continue;
            }
            let converted = if p.dst.is_array {
                match array_literal(raw) {
                    Some(literal) => convert_array(&p.name, &p.dst, &p.src_type, self.tz, &literal),
                    None => Err(MigrateError::convert(
                        &p.name,
                        format!("can't convert {} value to array", raw.kind()),
                    )),
                }
            } else {
                convert_scalar(&p.name, p.dst.kind, &p.src_type, self.tz, raw)
            };
            match converted {
                Ok(v) => {
                    cols.push(p.name.clone());
                    values.push(v);
                }
                Err(e @ MigrateError::Convert { .. }) => {
                    return Ok(RowOutcome::Skipped {
                        reason: e.to_string(),
                    })
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(synth) = &mut self.synth {
            cols.push(synth.col_name.clone());
            values.push(Value::String(synth.current_key()));
            synth.advance();
        }

        Ok(RowOutcome::Converted { cols, values })
    }
}

/// Arrays travel as their text encoding; bytes are decoded as UTF-8 text.
fn array_literal(raw: &RawValue) -> Option<String> {
    match raw {
        RawValue::Text(s) => Some(s.clone()),
        RawValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        _ => None,
    }
}

/// Drive one table's data pass: pull rows from the cursor, convert, emit.
///
/// Scan errors and skipped rows are counted and sampled against the report;
/// transport errors and column mismatches abort the table.
pub async fn run_table(
    source: &Table,
    target: &CreateTable,
    mut cursor: RowCursor,
    sink: &dyn RowSink,
    report: &Report,
    tz: FixedOffset,
    synth: Option<SyntheticKeyState>,
) -> Result<TableStats> {
    let mut converter = RowConverter::new(source, target, &cursor.columns, tz, synth)?;
    let mut stats = TableStats::default();

    while let Some(item) = cursor.rows.recv().await {
        let row = match item {
            Ok(row) => row,
            Err(e @ MigrateError::Source(_)) => {
                return Err(MigrateError::transfer(&source.name, e.to_string()))
            }
            Err(MigrateError::Cancelled) => return Err(MigrateError::Cancelled),
            Err(e) => {
                report.anomaly(format!("{}: row scan failed: {e}", source.name));
                report.add_bad_row(&source.name);
                stats.bad_rows += 1;
                continue;
            }
        };
        match converter.convert_row(&row)? {
            RowOutcome::Converted { cols, values } => {
                sink.write_row(&target.name, &cols, values).await?;
                stats.rows_written += 1;
            }
            RowOutcome::Skipped { reason } => {
                warn!(table = %source.name, %reason, "skipping row");
                report.add_bad_row(&source.name);
                let sample = row.values.iter().map(|v| v.sample_text()).collect();
                report.collect_bad_row(&source.name, &cursor.columns, sample);
                stats.bad_rows += 1;
            }
        }
    }

    debug!(
        table = %source.name,
        rows = stats.rows_written,
        bad_rows = stats.bad_rows,
        "table data pass complete"
    );
    Ok(stats)
}
