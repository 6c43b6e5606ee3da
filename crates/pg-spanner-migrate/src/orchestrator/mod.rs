//! Migration orchestrator - coordinates the schema and data passes.
//!
//! Schema pass: enumerate tables, build the normalized source model, map it
//! to the target model, inject synthetic keys, re-resolve foreign keys.
//! Data pass: stream each table through the row conversion engine, several
//! tables at a time, each table owned end-to-end by one worker.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::convert::engine::run_table;
use crate::convert::SyntheticKeyState;
use crate::core::ddl::{ColumnDef, ColumnType, CreateTable, TypeKind};
use crate::core::schema::Table;
use crate::core::traits::{IncludedTable, RowSink, SourceReader};
use crate::error::{MigrateError, Result};
use crate::report::Report;
use crate::schema::SchemaBuilder;
use crate::typemap::TypeMapper;
use crate::core::ids::IdGenerator;

const SYNTHETIC_KEY_NAME: &str = "synth_id";

/// The finished schema model: source tables and their target counterparts,
/// joined by shared table and column ids.
#[derive(Debug, Clone, Default)]
pub struct SchemaModel {
    pub tables: Vec<Table>,
    pub target: Vec<CreateTable>,

    /// Synthetic key column (id, name) per key-less table id.
    pub synthetic_keys: HashMap<String, (String, String)>,
}

impl SchemaModel {
    pub fn target_for(&self, table_id: &str) -> Option<&CreateTable> {
        self.target.iter().find(|t| t.id == table_id)
    }

    /// Table/column include list for the CDC orchestration layer.
    pub fn included_tables(&self) -> Vec<IncludedTable> {
        self.target
            .iter()
            .map(|t| IncludedTable {
                table: t.name.clone(),
                columns: t
                    .col_ids
                    .iter()
                    .map(|id| t.col_defs[id].name.clone())
                    .collect(),
            })
            .collect()
    }
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tables in the schema model.
    pub tables_total: usize,

    /// Tables whose data pass completed.
    pub tables_success: usize,

    /// Tables whose data pass failed.
    pub tables_failed: usize,

    /// Rows emitted to the sink across all tables.
    pub rows_converted: u64,

    /// Rows skipped as bad across all tables.
    pub bad_rows: u64,

    /// Names of tables whose data pass failed.
    pub failed_tables: Vec<String>,
}

impl MigrationResult {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Coordinates a full migration run against an injected source and sink.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn SourceReader>,
    sink: Arc<dyn RowSink>,
    report: Arc<Report>,
    ids: IdGenerator,
}

impl Orchestrator {
    pub fn new(config: Config, source: Arc<dyn SourceReader>, sink: Arc<dyn RowSink>) -> Self {
        let report = Arc::new(Report::new(config.conversion.bad_row_sample_limit));
        Self {
            config,
            source,
            sink,
            report,
            ids: IdGenerator::new(),
        }
    }

    pub fn report(&self) -> Arc<Report> {
        self.report.clone()
    }

    /// Schema pass: build the full source and target models.
    ///
    /// A table whose catalog queries fail is reported and skipped; the pass
    /// continues with the remaining tables.
    pub async fn build_schema(&self) -> Result<SchemaModel> {
        let mapper = TypeMapper::new(self.config.conversion.array_support);

        let all_tables = self.source.list_tables().await?;
        let included: Vec<_> = all_tables
            .into_iter()
            .filter(|t| {
                self.config
                    .conversion
                    .table_included(&t.schema, &t.name)
            })
            .collect();
        if included.is_empty() {
            return Err(MigrateError::SchemaExtraction(
                "no tables matched the include/exclude filters".into(),
            ));
        }

        let schema_is_unique = SchemaBuilder::schema_is_unique(&included);
        let builder = SchemaBuilder::new(
            &self.ids,
            &self.config.source.default_schema,
            schema_is_unique,
            &self.report,
        );

        let mut model = SchemaModel::default();
        for tref in &included {
            let fetched = async {
                let cols = self.source.column_rows(tref).await?;
                let cons = self.source.constraint_rows(tref).await?;
                let fks = self.source.foreign_key_rows(tref).await?;
                let idxs = self.source.index_rows(tref).await?;
                Ok::<_, MigrateError>((cols, cons, fks, idxs))
            }
            .await;
            let (cols, cons, fks, idxs) = match fetched {
                Ok(rows) => rows,
                Err(e) => {
                    self.report.anomaly(format!(
                        "couldn't get schema for table {}.{}: {e}",
                        tref.schema, tref.name
                    ));
                    continue;
                }
            };

            let mut table = builder.build_table(tref, &cols, &cons, &fks, &idxs);
            table.row_count = self.source.row_count(tref).await.unwrap_or(0);

            let target = self.map_table(&mapper, &mut table, &mut model.synthetic_keys);
            model.tables.push(table);
            model.target.push(target);
        }

        self.resolve_foreign_keys(&mut model);
        info!(
            tables = model.tables.len(),
            schema_is_unique, "schema pass complete"
        );
        Ok(model)
    }

    /// Map one source table to its target definition, recording schema
    /// issues and injecting a synthetic key when the table has none.
    fn map_table(
        &self,
        mapper: &TypeMapper,
        table: &mut Table,
        synthetic_keys: &mut HashMap<String, (String, String)>,
    ) -> CreateTable {
        let mut col_defs = HashMap::with_capacity(table.col_ids.len());
        for col_id in &table.col_ids {
            let col = &table.col_defs[col_id];
            let (ty, issues) = mapper.map_column(col);
            self.report.add_issues(&table.id, col_id, &issues);
            col_defs.insert(
                col_id.clone(),
                ColumnDef {
                    id: col_id.clone(),
                    name: col.name.clone(),
                    ty,
                    not_null: col.not_null,
                },
            );
        }

        let mut col_ids = table.col_ids.clone();
        let primary_keys = if table.has_pk() {
            table.primary_keys.clone()
        } else {
            let name = self.synthetic_key_name(table);
            let col_id = self.ids.column_id();
            col_defs.insert(
                col_id.clone(),
                ColumnDef {
                    id: col_id.clone(),
                    name: name.clone(),
                    ty: ColumnType::max(TypeKind::String),
                    not_null: true,
                },
            );
            col_ids.push(col_id.clone());
            synthetic_keys.insert(table.id.clone(), (col_id.clone(), name.clone()));
            info!(table = %table.name, column = %name, "injected synthetic primary key");
            vec![col_id]
        };

        CreateTable {
            id: table.id.clone(),
            name: table.name.clone(),
            col_ids,
            col_defs,
            primary_keys,
        }
    }

    /// Pick a key column name that doesn't collide with existing columns.
    fn synthetic_key_name(&self, table: &Table) -> String {
        let mut name = SYNTHETIC_KEY_NAME.to_string();
        while table.col_defs.values().any(|c| c.name == name) {
            name.push('_');
        }
        name
    }

    /// Re-resolve foreign keys across the finished model: referenced display
    /// names become table ids and referenced column names become column ids.
    /// Keys referencing tables outside the model are dropped with an anomaly.
    fn resolve_foreign_keys(&self, model: &mut SchemaModel) {
        let by_name: HashMap<String, (String, HashMap<String, String>)> = model
            .tables
            .iter()
            .map(|t| (t.name.clone(), (t.id.clone(), t.col_name_id_map())))
            .collect();

        for table in &mut model.tables {
            let table_name = table.name.clone();
            table.foreign_keys.retain_mut(|fk| {
                let Some((refer_id, refer_cols)) = by_name.get(&fk.refer_table) else {
                    self.report.anomaly(format!(
                        "{table_name}: foreign key '{}' references table '{}' outside the migration",
                        fk.name, fk.refer_table
                    ));
                    return false;
                };
                fk.refer_table_id = Some(refer_id.clone());
                fk.refer_col_ids.clear();
                for col in &fk.refer_columns {
                    match refer_cols.get(col) {
                        Some(id) => fk.refer_col_ids.push(id.clone()),
                        None => {
                            self.report.anomaly(format!(
                                "{table_name}: foreign key '{}' references unknown column '{col}' \
                                 of '{}'",
                                fk.name, fk.refer_table
                            ));
                            return false;
                        }
                    }
                }
                true
            });
        }
    }

    /// Full run: schema pass, then the data pass for every table.
    pub async fn run(&self, cancel: CancellationToken) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting migration run: {run_id}");

        let model = Arc::new(self.build_schema().await?);
        let stats = self.run_data_pass(&model, cancel).await?;

        let completed_at = Utc::now();
        let mut failed_tables: Vec<String> = stats
            .iter()
            .filter_map(|(name, outcome)| outcome.as_ref().err().map(|_| name.clone()))
            .collect();
        failed_tables.sort();

        let rows_converted = stats
            .values()
            .filter_map(|o| o.as_ref().ok())
            .map(|s| s.rows_written)
            .sum();
        let bad_rows = stats
            .values()
            .filter_map(|o| o.as_ref().ok())
            .map(|s| s.bad_rows)
            .sum();

        Ok(MigrationResult {
            run_id,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            tables_total: model.tables.len(),
            tables_success: model.tables.len() - failed_tables.len(),
            tables_failed: failed_tables.len(),
            rows_converted,
            bad_rows,
            failed_tables,
        })
    }

    /// Data pass: each table is processed end-to-end by one worker; up to
    /// `workers` tables run concurrently. A failed table is recorded and
    /// the pass continues.
    async fn run_data_pass(
        &self,
        model: &Arc<SchemaModel>,
        cancel: CancellationToken,
    ) -> Result<HashMap<String, std::result::Result<crate::convert::TableStats, String>>> {
        let workers = self.config.conversion.workers;
        let semaphore = Arc::new(Semaphore::new(workers));
        let tz = self.config.default_offset()?;
        info!(
            tables = model.tables.len(),
            workers, "starting data pass"
        );

        let mut handles = Vec::with_capacity(model.tables.len());
        for (idx, table) in model.tables.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("cancellation requested, not starting remaining tables");
                break;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| MigrateError::Cancelled)?;

            let model = model.clone();
            let source = self.source.clone();
            let sink = self.sink.clone();
            let report = self.report.clone();
            let cancel = cancel.child_token();
            let table_name = table.name.clone();

            let handle = tokio::spawn(async move {
                let table = &model.tables[idx];
                let target = model
                    .target_for(&table.id)
                    .ok_or_else(|| MigrateError::transfer(&table.name, "no target schema"))?;
                let synth = model
                    .synthetic_keys
                    .get(&table.id)
                    .map(|(id, name)| SyntheticKeyState::new(id.clone(), name.clone()));
                let cursor = source.scan_rows(table, cancel).await?;
                let result = run_table(table, target, cursor, sink.as_ref(), &report, tz, synth)
                    .await;
                drop(permit);
                result
            });
            handles.push((table_name, handle));
        }

        let mut outcomes = HashMap::with_capacity(handles.len());
        for (table_name, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(stats)) => {
                    info!(
                        table = %table_name,
                        rows = stats.rows_written,
                        bad_rows = stats.bad_rows,
                        "table completed"
                    );
                    Ok(stats)
                }
                Ok(Err(MigrateError::Cancelled)) => return Err(MigrateError::Cancelled),
                Ok(Err(e)) => {
                    error!(table = %table_name, error = %e, "table data pass failed");
                    Err(e.to_string())
                }
                Err(e) => {
                    error!(table = %table_name, error = %e, "table worker panicked");
                    Err(e.to_string())
                }
            };
            outcomes.insert(table_name, outcome);
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::config::{ConversionConfig, SourceConfig, TargetConfig};
    use crate::core::traits::{
        RawColumnRow, RawConstraintRow, RawForeignKeyRow, RawIndexRow, RowCursor, TableRef,
    };
    use crate::core::value::{RawRow, RawValue, Value};

    fn test_config() -> Config {
        Config {
            source: SourceConfig {
                r#type: "postgres".into(),
                host: "localhost".into(),
                port: 5432,
                database: "testdb".into(),
                user: "tester".into(),
                password: "secret".into(),
                default_schema: "public".into(),
                ssl_mode: "disable".into(),
                max_connections: 2,
            },
            target: TargetConfig {
                project: "p".into(),
                instance: "i".into(),
                database: "d".into(),
            },
            conversion: ConversionConfig {
                workers: 2,
                ..Default::default()
            },
        }
    }

    /// In-memory source with two tables: `orders` (with pk) referencing
    /// key-less `customers`.
    struct FakeSource {
        rows_per_table: usize,
    }

    fn col(name: &str, data_type: &str) -> RawColumnRow {
        RawColumnRow {
            name: name.to_string(),
            data_type: data_type.to_string(),
            element_type: None,
            is_nullable: false,
            has_default: false,
            char_max_len: None,
            numeric_precision: None,
            numeric_scale: None,
        }
    }

    #[async_trait]
    impl SourceReader for FakeSource {
        async fn list_tables(&self) -> Result<Vec<TableRef>> {
            Ok(vec![
                TableRef {
                    schema: "public".into(),
                    name: "customers".into(),
                },
                TableRef {
                    schema: "public".into(),
                    name: "orders".into(),
                },
            ])
        }

        async fn column_rows(&self, table: &TableRef) -> Result<Vec<RawColumnRow>> {
            Ok(match table.name.as_str() {
                "customers" => vec![col("email", "text"), col("age", "smallint")],
                _ => vec![col("id", "bigint"), col("email", "text")],
            })
        }

        async fn constraint_rows(&self, table: &TableRef) -> Result<Vec<RawConstraintRow>> {
            Ok(match table.name.as_str() {
                "orders" => vec![RawConstraintRow {
                    column: "id".into(),
                    kind: "PRIMARY KEY".into(),
                }],
                _ => Vec::new(),
            })
        }

        async fn foreign_key_rows(&self, table: &TableRef) -> Result<Vec<RawForeignKeyRow>> {
            Ok(match table.name.as_str() {
                "orders" => vec![RawForeignKeyRow {
                    constraint: "fk_customer".into(),
                    column: "email".into(),
                    refer_schema: "public".into(),
                    refer_table: "customers".into(),
                    refer_column: "email".into(),
                    on_delete: "CASCADE".into(),
                    on_update: "NO ACTION".into(),
                }],
                _ => Vec::new(),
            })
        }

        async fn index_rows(&self, _table: &TableRef) -> Result<Vec<RawIndexRow>> {
            Ok(Vec::new())
        }

        async fn row_count(&self, _table: &TableRef) -> Result<i64> {
            Ok(self.rows_per_table as i64)
        }

        async fn scan_rows(&self, table: &Table, _cancel: CancellationToken) -> Result<RowCursor> {
            let mut columns = Vec::with_capacity(table.col_ids.len());
            let mut types = Vec::with_capacity(table.col_ids.len());
            for id in &table.col_ids {
                let c = &table.col_defs[id];
                columns.push(c.name.clone());
                types.push(c.ty.name.clone());
            }
            let (tx, rx) = mpsc::channel(16);
            let n = self.rows_per_table;
            tokio::spawn(async move {
                for i in 0..n {
                    let values = types
                        .iter()
                        .map(|t| match t.as_str() {
                            "text" => RawValue::Text(format!("u{i}@example.com")),
                            _ => RawValue::Int64(i as i64),
                        })
                        .collect();
                    if tx.send(Ok(RawRow { values })).await.is_err() {
                        return;
                    }
                }
            });
            Ok(RowCursor { columns, rows: rx })
        }

        fn db_type(&self) -> &str {
            "postgres"
        }

        async fn close(&self) {}
    }

    #[derive(Default)]
    struct CountingSink {
        rows: Mutex<Vec<(String, Vec<String>, Vec<Value>)>>,
    }

    #[async_trait]
    impl RowSink for CountingSink {
        async fn write_row(&self, table: &str, cols: &[String], values: Vec<Value>) -> Result<()> {
            self.rows
                .lock()
                .unwrap()
                .push((table.to_string(), cols.to_vec(), values));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_schema_pass_injects_synthetic_key_and_resolves_fks() {
        let orchestrator = Orchestrator::new(
            test_config(),
            Arc::new(FakeSource { rows_per_table: 0 }),
            Arc::new(CountingSink::default()),
        );
        let model = orchestrator.build_schema().await.unwrap();
        assert_eq!(model.tables.len(), 2);

        // Key-less customers table gets exactly one synthetic key, placed last.
        let customers = model.tables.iter().find(|t| t.name == "customers").unwrap();
        let target = model.target_for(&customers.id).unwrap();
        assert_eq!(model.synthetic_keys.len(), 1);
        let (synth_id, synth_name) = &model.synthetic_keys[&customers.id];
        assert_eq!(synth_name, "synth_id");
        assert_eq!(target.col_ids.last().unwrap(), synth_id);
        assert_eq!(target.primary_keys, vec![synth_id.clone()]);

        // The keyed table keeps its declared primary key.
        let orders = model.tables.iter().find(|t| t.name == "orders").unwrap();
        let orders_target = model.target_for(&orders.id).unwrap();
        assert_eq!(orders_target.primary_keys, orders.primary_keys);

        // Foreign key re-resolution fills in ids of matching length.
        let fk = &orders.foreign_keys[0];
        assert_eq!(fk.refer_table_id.as_deref(), Some(customers.id.as_str()));
        assert_eq!(fk.refer_col_ids.len(), fk.refer_columns.len());

        // Widened smallint recorded as a schema issue.
        let age_id = customers.col_id_by_name("age").unwrap();
        let issues = orchestrator.report.column_issues(&customers.id, age_id);
        assert!(issues.contains(&crate::core::issue::SchemaIssue::Widened));
    }

    #[tokio::test]
    async fn test_full_run_counts_rows() {
        let sink = Arc::new(CountingSink::default());
        let orchestrator = Orchestrator::new(
            test_config(),
            Arc::new(FakeSource { rows_per_table: 3 }),
            sink.clone(),
        );
        let result = orchestrator.run(CancellationToken::new()).await.unwrap();

        assert_eq!(result.tables_total, 2);
        assert_eq!(result.tables_failed, 0);
        assert_eq!(result.rows_converted, 6);
        assert_eq!(result.bad_rows, 0);

        // Synthetic keys appended in cursor order for the key-less table.
        let rows = sink.rows.lock().unwrap();
        let customer_rows: Vec<_> = rows.iter().filter(|(t, _, _)| t == "customers").collect();
        assert_eq!(customer_rows.len(), 3);
        assert_eq!(
            customer_rows[0].1.last().map(String::as_str),
            Some("synth_id")
        );
        assert_eq!(customer_rows[0].2.last(), Some(&Value::String("0".into())));
    }

    #[tokio::test]
    async fn test_included_tables_derivation() {
        let orchestrator = Orchestrator::new(
            test_config(),
            Arc::new(FakeSource { rows_per_table: 0 }),
            Arc::new(CountingSink::default()),
        );
        let model = orchestrator.build_schema().await.unwrap();
        let included = model.included_tables();
        assert_eq!(included.len(), 2);
        let customers = included.iter().find(|t| t.table == "customers").unwrap();
        assert_eq!(customers.columns, vec!["email", "age", "synth_id"]);
    }
}
