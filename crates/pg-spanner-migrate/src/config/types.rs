//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (PostgreSQL).
    pub source: SourceConfig,

    /// Target database profile (Spanner), consumed by the external
    /// schema writer and CDC layers.
    pub target: TargetConfig,

    /// Conversion behavior configuration.
    #[serde(default)]
    pub conversion: ConversionConfig,
}

/// Source database (PostgreSQL) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type (always "postgres" for now).
    #[serde(default = "default_postgres")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Default namespace; tables in it are never schema-qualified
    /// (default: "public").
    #[serde(default = "default_public_schema")]
    pub default_schema: String,

    /// SSL mode: disable, require, verify-ca, verify-full (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,

    /// Maximum pooled connections (default: 8).
    #[serde(default = "default_max_conns")]
    pub max_connections: usize,
}

/// Target database (Spanner) profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Cloud project id.
    pub project: String,

    /// Spanner instance id.
    pub instance: String,

    /// Database name.
    pub database: String,
}

/// Conversion behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Number of tables converted concurrently during the data pass
    /// (default: 4). Rows within a table are always sequential.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum raw-row samples retained per table for diagnostics
    /// (default: 100).
    #[serde(default = "default_bad_row_samples")]
    pub bad_row_sample_limit: usize,

    /// UTC offset applied to timestamps without a zone, e.g. "+00:00"
    /// or "-05:30".
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    /// Whether the target supports array columns. When false, array
    /// columns are flagged with an issue (default: true).
    #[serde(default = "default_true")]
    pub array_support: bool,

    /// Tables to include (exact names, or a trailing `*` wildcard).
    /// Empty means all tables.
    #[serde(default)]
    pub include_tables: Vec<String>,

    /// Tables to exclude (exact names, or a trailing `*` wildcard).
    #[serde(default)]
    pub exclude_tables: Vec<String>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            bad_row_sample_limit: default_bad_row_samples(),
            default_timezone: default_timezone(),
            array_support: true,
            include_tables: Vec::new(),
            exclude_tables: Vec::new(),
        }
    }
}

impl ConversionConfig {
    /// Whether a table passes the include/exclude filters. Patterns match
    /// either the bare table name or its `schema.name` form.
    pub fn table_included(&self, schema: &str, name: &str) -> bool {
        let qualified = format!("{schema}.{name}");
        let matches = |p: &String| matches_pattern(p, name) || matches_pattern(p, &qualified);
        if self.exclude_tables.iter().any(matches) {
            return false;
        }
        if self.include_tables.is_empty() {
            return true;
        }
        self.include_tables.iter().any(matches)
    }
}

/// Match a table name against a pattern: exact, or prefix with trailing `*`.
fn matches_pattern(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

// Default value functions for serde

fn default_postgres() -> String {
    "postgres".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_require() -> String {
    "require".to_string()
}

fn default_max_conns() -> usize {
    8
}

fn default_workers() -> usize {
    4
}

fn default_bad_row_samples() -> usize {
    100
}

fn default_timezone() -> String {
    "+00:00".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_filters() {
        let mut cfg = ConversionConfig::default();
        assert!(cfg.table_included("public", "users"));

        cfg.include_tables = vec!["users".into(), "audit_*".into()];
        assert!(cfg.table_included("public", "users"));
        assert!(cfg.table_included("public", "audit_log"));
        assert!(!cfg.table_included("public", "orders"));

        cfg.exclude_tables = vec!["audit_tmp*".into()];
        assert!(cfg.table_included("public", "audit_log"));
        assert!(!cfg.table_included("public", "audit_tmp_2024"));
    }

    #[test]
    fn test_qualified_patterns() {
        let mut cfg = ConversionConfig::default();
        cfg.include_tables = vec!["sales.orders".into()];
        assert!(cfg.table_included("sales", "orders"));
        assert!(!cfg.table_included("public", "orders"));
    }
}
