//! Schema model builder: raw catalog rows -> normalized [`Table`] objects.
//!
//! The builder is pure with respect to the source database: it consumes the
//! raw rows the catalog reader fetched and interprets them. Malformed rows
//! are reported as anomalies and skipped; they never abort table processing.

use std::collections::HashMap;

use crate::core::ids::IdGenerator;
use crate::core::schema::{
    Column, ForeignKey, Ignored, Index, IndexKey, ReferentialAction, Table, Type,
};
use crate::core::traits::{
    RawColumnRow, RawConstraintRow, RawForeignKeyRow, RawIndexRow, TableRef,
};
use crate::report::Report;

/// Builds normalized tables from raw catalog rows.
///
/// `schema_is_unique` is computed once after table enumeration (true when
/// the whole catalog lives in a single namespace) and threaded in as an
/// immutable field; it decides display-name qualification.
pub struct SchemaBuilder<'a> {
    ids: &'a IdGenerator,
    default_schema: &'a str,
    schema_is_unique: bool,
    report: &'a Report,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(
        ids: &'a IdGenerator,
        default_schema: &'a str,
        schema_is_unique: bool,
        report: &'a Report,
    ) -> Self {
        Self {
            ids,
            default_schema,
            schema_is_unique,
            report,
        }
    }

    /// Compute whether a catalog spans a single namespace.
    pub fn schema_is_unique(tables: &[TableRef]) -> bool {
        let mut first: Option<&str> = None;
        for t in tables {
            match first {
                None => first = Some(&t.schema),
                Some(s) if s != t.schema => return false,
                Some(_) => {}
            }
        }
        true
    }

    /// Display name for a table: qualified with its namespace only when the
    /// catalog spans more than one namespace, and never for the configured
    /// default namespace.
    pub fn display_name(&self, schema: &str, name: &str) -> String {
        if self.schema_is_unique || schema == self.default_schema {
            name.to_string()
        } else {
            format!("{schema}.{name}")
        }
    }

    /// Build a [`Table`] from one table's raw catalog rows.
    pub fn build_table(
        &self,
        table: &TableRef,
        columns: &[RawColumnRow],
        constraints: &[RawConstraintRow],
        foreign_keys: &[RawForeignKeyRow],
        indexes: &[RawIndexRow],
    ) -> Table {
        let display = self.display_name(&table.schema, &table.name);
        let (pk_names, col_constraints) = self.split_constraints(&display, constraints);

        let mut col_ids = Vec::with_capacity(columns.len());
        let mut col_defs = HashMap::with_capacity(columns.len());
        for raw in columns {
            if raw.name.is_empty() {
                self.report
                    .anomaly(format!("{display}: column row with empty name, skipped"));
                continue;
            }
            let has_check = col_constraints
                .get(raw.name.as_str())
                .map(|kinds| kinds.iter().any(|k| k == "CHECK"))
                .unwrap_or(false);
            let id = self.ids.column_id();
            let col = Column {
                id: id.clone(),
                name: raw.name.clone(),
                ty: normalize_type(raw),
                not_null: !raw.is_nullable,
                ignored: Ignored {
                    check: has_check,
                    default: raw.has_default,
                },
            };
            col_defs.insert(id.clone(), col);
            col_ids.push(id);
        }

        let name_to_id: HashMap<&str, &str> = col_ids
            .iter()
            .map(|id| (col_defs[id].name.as_str(), id.as_str()))
            .collect();

        // Primary key order is whatever ordinal order the catalog reported.
        let mut primary_keys = Vec::new();
        for name in &pk_names {
            match name_to_id.get(name.as_str()) {
                Some(id) => primary_keys.push((*id).to_string()),
                None => self.report.anomaly(format!(
                    "{display}: primary key references unknown column '{name}'"
                )),
            }
        }

        let foreign_keys = self.build_foreign_keys(&display, foreign_keys, &name_to_id);
        let indexes = self.build_indexes(&display, indexes, &name_to_id);

        Table {
            id: self.ids.table_id(),
            name: display,
            schema: table.schema.clone(),
            col_ids,
            col_defs,
            primary_keys,
            foreign_keys,
            indexes,
            row_count: 0,
        }
    }

    /// Split raw constraint rows into primary-key column names (arrival
    /// order) and a column -> constraint-kind map for the rest.
    fn split_constraints(
        &self,
        display: &str,
        rows: &[RawConstraintRow],
    ) -> (Vec<String>, HashMap<String, Vec<String>>) {
        let mut primary = Vec::new();
        let mut by_col: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows {
            if row.column.is_empty() || row.kind.is_empty() {
                self.report
                    .anomaly(format!("{display}: empty column or constraint kind, skipped"));
                continue;
            }
            if row.kind == "PRIMARY KEY" {
                primary.push(row.column.clone());
            } else {
                by_col.entry(row.column.clone()).or_default().push(row.kind.clone());
            }
        }
        (primary, by_col)
    }

    /// Group foreign-key rows by constraint name (insertion order), fold each
    /// group into one key with columns in row-arrival order, and sort the
    /// final list by constraint name.
    fn build_foreign_keys(
        &self,
        display: &str,
        rows: &[RawForeignKeyRow],
        name_to_id: &HashMap<&str, &str>,
    ) -> Vec<ForeignKey> {
        let groups = group_by(rows, |r| r.constraint.clone());

        let mut keys = Vec::with_capacity(groups.len());
        for (constraint, members) in groups {
            let mut col_ids = Vec::new();
            let mut refer_columns = Vec::new();
            let mut refer_table = String::new();
            let mut on_delete = ReferentialAction::NoAction;
            let mut on_update = ReferentialAction::NoAction;

            for row in &members {
                if row.column.is_empty() || row.refer_column.is_empty() {
                    self.report.anomaly(format!(
                        "{display}: foreign key '{constraint}' row with empty column, skipped"
                    ));
                    continue;
                }
                let Some(id) = name_to_id.get(row.column.as_str()) else {
                    self.report.anomaly(format!(
                        "{display}: foreign key '{constraint}' references unknown column '{}'",
                        row.column
                    ));
                    continue;
                };
                col_ids.push((*id).to_string());
                refer_columns.push(row.refer_column.clone());
                refer_table = self.display_name(&row.refer_schema, &row.refer_table);
                on_delete = self.parse_action(display, &constraint, &row.on_delete);
                on_update = self.parse_action(display, &constraint, &row.on_update);
            }

            if col_ids.is_empty() {
                continue;
            }
            keys.push(ForeignKey {
                id: self.ids.foreign_key_id(),
                name: constraint,
                col_ids,
                refer_table,
                refer_table_id: None,
                refer_columns,
                refer_col_ids: Vec::new(),
                on_delete,
                on_update,
            });
        }

        keys.sort_by(|a, b| a.name.cmp(&b.name));
        keys
    }

    fn parse_action(&self, display: &str, constraint: &str, raw: &str) -> ReferentialAction {
        raw.parse().unwrap_or_else(|e: String| {
            self.report
                .anomaly(format!("{display}: foreign key '{constraint}': {e}"));
            ReferentialAction::NoAction
        })
    }

    /// Group index rows by index name (insertion order) and fold each group
    /// into one index with keys ordered by the catalog's position field.
    /// The final list preserves first-seen order of index names.
    fn build_indexes(
        &self,
        display: &str,
        rows: &[RawIndexRow],
        name_to_id: &HashMap<&str, &str>,
    ) -> Vec<Index> {
        let groups = group_by(rows, |r| r.name.clone());

        let mut indexes = Vec::with_capacity(groups.len());
        for (name, mut members) in groups {
            members.sort_by_key(|r| r.position);

            let unique = members.first().map(|r| r.unique).unwrap_or(false);
            let mut index_keys = Vec::with_capacity(members.len());
            for row in &members {
                let Some(id) = name_to_id.get(row.column.as_str()) else {
                    self.report.anomaly(format!(
                        "{display}: index '{name}' references unknown column '{}'",
                        row.column
                    ));
                    continue;
                };
                index_keys.push(IndexKey {
                    col_id: (*id).to_string(),
                    desc: row.order.eq_ignore_ascii_case("DESC"),
                });
            }

            if index_keys.is_empty() {
                continue;
            }
            indexes.push(Index {
                id: self.ids.index_id(),
                name,
                unique,
                keys: index_keys,
            });
        }
        indexes
    }
}

/// Normalize a raw column row into a canonical type descriptor.
///
/// An ARRAY-kind declared type with a valid element type becomes the element
/// type with a single unbounded array dimension. Character length, or numeric
/// precision/scale, become modifiers.
pub fn normalize_type(raw: &RawColumnRow) -> Type {
    if raw.data_type == "ARRAY" {
        if let Some(element) = &raw.element_type {
            return Type {
                name: element.clone(),
                mods: Vec::new(),
                array_bounds: vec![-1],
            };
        }
    }
    let mods = match (raw.char_max_len, raw.numeric_precision, raw.numeric_scale) {
        (Some(len), _, _) => vec![len],
        (None, Some(p), Some(s)) if s != 0 => vec![p, s],
        (None, Some(p), _) => vec![p],
        _ => Vec::new(),
    };
    Type {
        name: raw.data_type.clone(),
        mods,
        array_bounds: Vec::new(),
    }
}

/// Stable insertion-ordered grouping: distinct keys keep first-seen order,
/// members keep row-arrival order.
fn group_by<T: Clone, F: Fn(&T) -> String>(rows: &[T], key: F) -> Vec<(String, Vec<T>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<T>> = HashMap::new();
    for row in rows {
        let k = key(row);
        if !groups.contains_key(&k) {
            order.push(k.clone());
        }
        groups.entry(k).or_default().push(row.clone());
    }
    order
        .into_iter()
        .map(|k| {
            let members = groups.remove(&k).unwrap_or_default();
            (k, members)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_col(name: &str, data_type: &str) -> RawColumnRow {
        RawColumnRow {
            name: name.to_string(),
            data_type: data_type.to_string(),
            element_type: None,
            is_nullable: true,
            has_default: false,
            char_max_len: None,
            numeric_precision: None,
            numeric_scale: None,
        }
    }

    fn builder_parts() -> (IdGenerator, Report) {
        (IdGenerator::new(), Report::new(10))
    }

    #[test]
    fn test_normalize_array_type() {
        let mut raw = raw_col("tags", "ARRAY");
        raw.element_type = Some("text".to_string());
        let ty = normalize_type(&raw);
        assert_eq!(ty.name, "text");
        assert_eq!(ty.array_bounds, vec![-1]);
        assert!(ty.mods.is_empty());
    }

    #[test]
    fn test_normalize_char_length() {
        let mut raw = raw_col("code", "character");
        raw.char_max_len = Some(8);
        assert_eq!(normalize_type(&raw).mods, vec![8]);
    }

    #[test]
    fn test_normalize_numeric_mods() {
        let mut raw = raw_col("amount", "numeric");
        raw.numeric_precision = Some(12);
        raw.numeric_scale = Some(4);
        assert_eq!(normalize_type(&raw).mods, vec![12, 4]);

        raw.numeric_scale = Some(0);
        assert_eq!(normalize_type(&raw).mods, vec![12]);

        raw.numeric_scale = None;
        assert_eq!(normalize_type(&raw).mods, vec![12]);
    }

    #[test]
    fn test_display_name_qualification() {
        let (ids, report) = builder_parts();

        // Single namespace: never qualified.
        let b = SchemaBuilder::new(&ids, "public", true, &report);
        assert_eq!(b.display_name("sales", "orders"), "orders");

        // Multiple namespaces: qualified, except the default namespace.
        let b = SchemaBuilder::new(&ids, "public", false, &report);
        assert_eq!(b.display_name("sales", "orders"), "sales.orders");
        assert_eq!(b.display_name("public", "orders"), "orders");
    }

    #[test]
    fn test_schema_is_unique() {
        let t = |s: &str, n: &str| TableRef {
            schema: s.to_string(),
            name: n.to_string(),
        };
        assert!(SchemaBuilder::schema_is_unique(&[
            t("public", "a"),
            t("public", "b")
        ]));
        assert!(!SchemaBuilder::schema_is_unique(&[
            t("public", "a"),
            t("sales", "b")
        ]));
        assert!(SchemaBuilder::schema_is_unique(&[]));
    }

    #[test]
    fn test_build_table_pk_order_and_check_flag() {
        let (ids, report) = builder_parts();
        let b = SchemaBuilder::new(&ids, "public", true, &report);

        let cols = vec![raw_col("a", "bigint"), raw_col("b", "text")];
        let constraints = vec![
            RawConstraintRow {
                column: "b".into(),
                kind: "PRIMARY KEY".into(),
            },
            RawConstraintRow {
                column: "a".into(),
                kind: "PRIMARY KEY".into(),
            },
            RawConstraintRow {
                column: "a".into(),
                kind: "CHECK".into(),
            },
        ];
        let table = b.build_table(
            &TableRef {
                schema: "public".into(),
                name: "pairs".into(),
            },
            &cols,
            &constraints,
            &[],
            &[],
        );

        // PK order follows catalog arrival order, not column order.
        let pk_names: Vec<_> = table
            .primary_keys
            .iter()
            .map(|id| table.col_defs[id].name.as_str())
            .collect();
        assert_eq!(pk_names, vec!["b", "a"]);

        let a_id = table.col_id_by_name("a").unwrap();
        assert!(table.col_defs[a_id].ignored.check);
        let b_id = table.col_id_by_name("b").unwrap();
        assert!(!table.col_defs[b_id].ignored.check);
    }

    #[test]
    fn test_foreign_keys_merged_and_sorted() {
        let (ids, report) = builder_parts();
        let b = SchemaBuilder::new(&ids, "public", true, &report);

        let cols = vec![raw_col("x", "bigint"), raw_col("y", "bigint")];
        let fk_row = |constraint: &str, column: &str, refer: &str| RawForeignKeyRow {
            constraint: constraint.to_string(),
            column: column.to_string(),
            refer_schema: "public".to_string(),
            refer_table: "parent".to_string(),
            refer_column: refer.to_string(),
            on_delete: "CASCADE".to_string(),
            on_update: "NO ACTION".to_string(),
        };
        // Two constraints interleaved; fk_b seen first.
        let rows = vec![
            fk_row("fk_b", "x", "px"),
            fk_row("fk_a", "y", "py"),
            fk_row("fk_b", "y", "py"),
        ];
        let table = b.build_table(
            &TableRef {
                schema: "public".into(),
                name: "child".into(),
            },
            &cols,
            &[],
            &rows,
            &[],
        );

        // Final list sorted by constraint name.
        assert_eq!(table.foreign_keys.len(), 2);
        assert_eq!(table.foreign_keys[0].name, "fk_a");
        assert_eq!(table.foreign_keys[1].name, "fk_b");

        // Merged columns preserve row-arrival order, matching lengths.
        let fk_b = &table.foreign_keys[1];
        assert_eq!(fk_b.col_ids.len(), 2);
        assert_eq!(fk_b.refer_columns, vec!["px", "py"]);
        assert_eq!(fk_b.on_delete, ReferentialAction::Cascade);
        assert_eq!(fk_b.refer_table, "parent");
    }

    #[test]
    fn test_indexes_merged_ordered_desc() {
        let (ids, report) = builder_parts();
        let b = SchemaBuilder::new(&ids, "public", true, &report);

        let cols = vec![raw_col("x", "bigint"), raw_col("y", "text")];
        let idx_row = |name: &str, column: &str, position: i64, order: &str| RawIndexRow {
            name: name.to_string(),
            column: column.to_string(),
            position,
            unique: name == "idx_u",
            order: order.to_string(),
        };
        // idx_u seen first; its members arrive out of position order.
        let rows = vec![
            idx_row("idx_u", "y", 2, "DESC"),
            idx_row("idx_plain", "x", 1, "ASC"),
            idx_row("idx_u", "x", 1, "ASC"),
        ];
        let table = b.build_table(
            &TableRef {
                schema: "public".into(),
                name: "t".into(),
            },
            &cols,
            &[],
            &[],
            &rows,
        );

        // First-seen insertion order of index names.
        assert_eq!(table.indexes.len(), 2);
        assert_eq!(table.indexes[0].name, "idx_u");
        assert_eq!(table.indexes[1].name, "idx_plain");

        // Keys ordered by position; DESC flag round-trips.
        let idx_u = &table.indexes[0];
        assert!(idx_u.unique);
        let key_names: Vec<_> = idx_u
            .keys
            .iter()
            .map(|k| table.col_defs[&k.col_id].name.as_str())
            .collect();
        assert_eq!(key_names, vec!["x", "y"]);
        assert!(!idx_u.keys[0].desc);
        assert!(idx_u.keys[1].desc);
    }

    #[test]
    fn test_malformed_rows_skipped_not_fatal() {
        let (ids, report) = builder_parts();
        let b = SchemaBuilder::new(&ids, "public", true, &report);

        let cols = vec![raw_col("", "text"), raw_col("ok", "text")];
        let constraints = vec![RawConstraintRow {
            column: "".into(),
            kind: "".into(),
        }];
        let table = b.build_table(
            &TableRef {
                schema: "public".into(),
                name: "t".into(),
            },
            &cols,
            &constraints,
            &[],
            &[],
        );

        assert_eq!(table.col_ids.len(), 1);
        assert!(!report.anomalies().is_empty());
    }
}
