//! PostgreSQL catalog reader and row streamer.
//!
//! Catalog methods issue information_schema / pg_catalog queries and return
//! raw rows; all interpretation happens in the schema builder. Row scans
//! stream through a bounded channel for backpressure and stop cleanly on
//! cancellation.

use std::sync::Arc;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use futures::{pin_mut, TryStreamExt};
use rustls::ClientConfig;
use tokio::sync::mpsc;
use tokio_postgres::Config as PgConfig;
use tokio_postgres_rustls::MakeRustlsConnect;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::core::schema::Table;
use crate::core::traits::{
    RawColumnRow, RawConstraintRow, RawForeignKeyRow, RawIndexRow, RowCursor, SourceReader,
    TableRef,
};
use crate::core::value::{RawRow, RawValue};
use crate::error::{MigrateError, Result};

/// Namespaces that never contain user tables.
const SYSTEM_SCHEMAS: &[&str] = &[
    "information_schema",
    "postgres",
    "pg_catalog",
    "pg_temp_1",
    "pg_toast",
    "pg_toast_temp_1",
];

const SCAN_CHANNEL_CAPACITY: usize = 1024;

/// PostgreSQL source backed by a deadpool connection pool.
pub struct PgSource {
    pool: Pool,
}

impl PgSource {
    /// Connect and verify the connection with a probe query.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(config.max_connections)
                    .build()
                    .map_err(|e| MigrateError::pool(e, "creating PostgreSQL source pool"))?
            }
            mode => {
                let tls_config = build_tls_config(mode)?;
                let tls_connector = MakeRustlsConnect::new(tls_config);
                let mgr = Manager::from_config(pg_config, tls_connector, mgr_config);
                Pool::builder(mgr)
                    .max_size(config.max_connections)
                    .build()
                    .map_err(|e| MigrateError::pool(e, "creating PostgreSQL source pool"))?
            }
        };

        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "testing PostgreSQL source connection"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL source: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { pool })
    }

    async fn client(&self, context: &'static str) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, context))
    }
}

#[async_trait]
impl SourceReader for PgSource {
    async fn list_tables(&self) -> Result<Vec<TableRef>> {
        let client = self.client("getting connection for list_tables").await?;

        let query = r#"
            SELECT table_schema, table_name
            FROM information_schema.tables
            WHERE table_type = 'BASE TABLE'
            ORDER BY table_schema, table_name
        "#;
        let rows = client.query(query, &[]).await?;

        let mut tables = Vec::new();
        for row in rows {
            let schema: String = row.get(0);
            if SYSTEM_SCHEMAS.contains(&schema.as_str()) {
                continue;
            }
            tables.push(TableRef {
                schema,
                name: row.get(1),
            });
        }
        info!("Discovered {} base tables", tables.len());
        Ok(tables)
    }

    async fn column_rows(&self, table: &TableRef) -> Result<Vec<RawColumnRow>> {
        let client = self.client("getting connection for column_rows").await?;

        // The element_types join resolves the element type of ARRAY columns.
        let query = r#"
            SELECT c.column_name, c.data_type, e.data_type,
                   CASE WHEN c.is_nullable = 'YES' THEN true ELSE false END,
                   c.column_default IS NOT NULL,
                   c.character_maximum_length::int8,
                   c.numeric_precision::int8,
                   c.numeric_scale::int8
            FROM information_schema.columns c
              LEFT JOIN information_schema.element_types e
                ON ((c.table_catalog, c.table_schema, c.table_name, 'TABLE', c.dtd_identifier)
                    = (e.object_catalog, e.object_schema, e.object_name, e.object_type,
                       e.collection_type_identifier))
            WHERE c.table_schema = $1 AND c.table_name = $2
            ORDER BY c.ordinal_position
        "#;
        let rows = client.query(query, &[&table.schema, &table.name]).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(RawColumnRow {
                name: row.get(0),
                data_type: row.get(1),
                element_type: row.get(2),
                is_nullable: row.get(3),
                has_default: row.get(4),
                char_max_len: row.get(5),
                numeric_precision: row.get(6),
                numeric_scale: row.get(7),
            });
        }
        debug!("Loaded {} column rows for {}.{}", out.len(), table.schema, table.name);
        Ok(out)
    }

    async fn constraint_rows(&self, table: &TableRef) -> Result<Vec<RawConstraintRow>> {
        let client = self.client("getting connection for constraint_rows").await?;

        // ordinal_position order preserves composite primary key order.
        let query = r#"
            SELECT k.column_name, t.constraint_type
            FROM information_schema.table_constraints AS t
              INNER JOIN information_schema.key_column_usage AS k
                ON t.constraint_name = k.constraint_name
               AND t.constraint_schema = k.constraint_schema
            WHERE k.table_schema = $1 AND k.table_name = $2
            ORDER BY k.ordinal_position
        "#;
        let rows = client.query(query, &[&table.schema, &table.name]).await?;

        Ok(rows
            .into_iter()
            .map(|row| RawConstraintRow {
                column: row.get(0),
                kind: row.get(1),
            })
            .collect())
    }

    async fn foreign_key_rows(&self, table: &TableRef) -> Result<Vec<RawForeignKeyRow>> {
        let client = self.client("getting connection for foreign_key_rows").await?;

        let query = r#"
            SELECT rc.constraint_name,
                   kcu.column_name,
                   ccu.table_schema,
                   ccu.table_name,
                   ccu.column_name,
                   rc.delete_rule,
                   rc.update_rule
            FROM information_schema.referential_constraints rc
              INNER JOIN information_schema.key_column_usage kcu
                ON rc.constraint_name = kcu.constraint_name
               AND rc.constraint_schema = kcu.constraint_schema
              INNER JOIN information_schema.constraint_column_usage ccu
                ON rc.constraint_name = ccu.constraint_name
               AND rc.constraint_schema = ccu.constraint_schema
            WHERE rc.constraint_schema = $1 AND kcu.table_name = $2
        "#;
        let rows = client.query(query, &[&table.schema, &table.name]).await?;

        Ok(rows
            .into_iter()
            .map(|row| RawForeignKeyRow {
                constraint: row.get(0),
                column: row.get(1),
                refer_schema: row.get(2),
                refer_table: row.get(3),
                refer_column: row.get(4),
                on_delete: row.get(5),
                on_update: row.get(6),
            })
            .collect())
    }

    async fn index_rows(&self, table: &TableRef) -> Result<Vec<RawIndexRow>> {
        let client = self.client("getting connection for index_rows").await?;

        // Primary-key-backing indexes are excluded; primary keys are
        // modeled separately.
        let query = r#"
            SELECT irel.relname AS index_name,
                   a.attname AS column_name,
                   (1 + array_position(i.indkey, a.attnum))::int8 AS column_position,
                   i.indisunique AS is_unique,
                   CASE o.option & 1 WHEN 1 THEN 'DESC' ELSE 'ASC' END AS sort_order
            FROM pg_index AS i
            JOIN pg_class AS trel ON trel.oid = i.indrelid
            JOIN pg_namespace AS tnsp ON trel.relnamespace = tnsp.oid
            JOIN pg_class AS irel ON irel.oid = i.indexrelid
            CROSS JOIN LATERAL unnest(i.indkey) WITH ORDINALITY AS c (colnum, ordinality)
            LEFT JOIN LATERAL unnest(i.indoption) WITH ORDINALITY AS o (option, ordinality)
              ON c.ordinality = o.ordinality
            JOIN pg_attribute AS a ON trel.oid = a.attrelid AND a.attnum = c.colnum
            WHERE tnsp.nspname = $1
              AND trel.relname = $2
              AND i.indisprimary = false
            GROUP BY tnsp.nspname, trel.relname, irel.relname, a.attname,
                     array_position(i.indkey, a.attnum), o.option, i.indisunique
            ORDER BY irel.relname, array_position(i.indkey, a.attnum)
        "#;
        let rows = client.query(query, &[&table.schema, &table.name]).await?;

        Ok(rows
            .into_iter()
            .map(|row| RawIndexRow {
                name: row.get(0),
                column: row.get(1),
                position: row.get(2),
                unique: row.get(3),
                order: row.get(4),
            })
            .collect())
    }

    async fn row_count(&self, table: &TableRef) -> Result<i64> {
        let client = self.client("getting connection for row_count").await?;

        // Schema and table names can be arbitrary strings and can't be
        // query parameters here, so they are quoted instead.
        let query = format!(
            "SELECT COUNT(*) FROM {}.{}",
            quote_ident(&table.schema),
            quote_ident(&table.name)
        );
        let row = client.query_one(&query, &[]).await?;
        Ok(row.get(0))
    }

    async fn scan_rows(&self, table: &Table, cancel: CancellationToken) -> Result<RowCursor> {
        let client = self.client("getting connection for scan_rows").await?;

        let mut columns = Vec::with_capacity(table.col_ids.len());
        let mut select_items = Vec::with_capacity(table.col_ids.len());
        let mut scan_kinds = Vec::with_capacity(table.col_ids.len());
        for col_id in &table.col_ids {
            let col = &table.col_defs[col_id];
            let kind = ScanKind::for_type(&col.ty.name, col.ty.is_array());
            select_items.push(kind.select_item(&col.name));
            scan_kinds.push(kind);
            columns.push(col.name.clone());
        }

        let query = format!(
            "SELECT {} FROM {}.{}",
            select_items.join(", "),
            quote_ident(&table.schema),
            quote_ident(&unqualified(&table.name))
        );

        let (tx, rx) = mpsc::channel(SCAN_CHANNEL_CAPACITY);
        let table_name = table.name.clone();
        tokio::spawn(async move {
            let stream = match client.query_raw(&query, Vec::<i32>::new()).await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(Err(MigrateError::Source(e))).await;
                    return;
                }
            };
            pin_mut!(stream);
            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(table = %table_name, "row scan cancelled");
                        let _ = tx.send(Err(MigrateError::Cancelled)).await;
                        return;
                    }
                    next = stream.try_next() => next,
                };
                match next {
                    Ok(Some(row)) => {
                        let item = scan_row(&row, &scan_kinds);
                        if tx.send(item).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => return,
                    Err(e) => {
                        let _ = tx.send(Err(MigrateError::Source(e))).await;
                        return;
                    }
                }
            }
        });

        Ok(RowCursor { columns, rows: rx })
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close();
    }
}

/// How to fetch one column into the raw value union. Kinds without a
/// native slot (numeric, date, arrays, anything unrecognized) are cast
/// to text in the SELECT list and decoded later by the conversion matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanKind {
    Bool,
    Bytes,
    Int64,
    Float32,
    Float64,
    Text,
    Timestamp,
    CastText,
}

impl ScanKind {
    fn for_type(type_name: &str, is_array: bool) -> Self {
        if is_array {
            return ScanKind::CastText;
        }
        match type_name {
            "bool" | "boolean" => ScanKind::Bool,
            "bytea" => ScanKind::Bytes,
            "bigint" | "int8" | "bigserial" => ScanKind::Int64,
            "integer" | "int" | "int4" | "serial" | "smallint" | "int2" | "smallserial" => {
                ScanKind::Int64
            }
            "real" | "float4" => ScanKind::Float32,
            "double precision" | "float8" => ScanKind::Float64,
            "text" | "character varying" | "varchar" | "character" | "char" | "bpchar" => {
                ScanKind::Text
            }
            "timestamp with time zone" | "timestamptz" => ScanKind::Timestamp,
            _ => ScanKind::CastText,
        }
    }

    /// SELECT-list expression for the column.
    fn select_item(self, name: &str) -> String {
        let ident = quote_ident(name);
        match self {
            // Narrow integers widen at query time so one slot covers them.
            ScanKind::Int64 => format!("{ident}::int8"),
            ScanKind::CastText => format!("{ident}::text"),
            _ => ident,
        }
    }
}

fn scan_row(row: &tokio_postgres::Row, kinds: &[ScanKind]) -> Result<RawRow> {
    // Decode failures here are per-row scan errors, reported as bad rows
    // by the driving loop rather than aborting the stream.
    let scan_err =
        |idx: usize, e: tokio_postgres::Error| MigrateError::convert(format!("#{idx}"), e.to_string());

    let mut values = Vec::with_capacity(kinds.len());
    for (idx, kind) in kinds.iter().enumerate() {
        let value = match kind {
            ScanKind::Bool => row
                .try_get::<_, Option<bool>>(idx)
                .map_err(|e| scan_err(idx, e))?
                .map_or(RawValue::Null, RawValue::Bool),
            ScanKind::Bytes => row
                .try_get::<_, Option<Vec<u8>>>(idx)
                .map_err(|e| scan_err(idx, e))?
                .map_or(RawValue::Null, RawValue::Bytes),
            ScanKind::Int64 => row
                .try_get::<_, Option<i64>>(idx)
                .map_err(|e| scan_err(idx, e))?
                .map_or(RawValue::Null, RawValue::Int64),
            ScanKind::Float32 => row
                .try_get::<_, Option<f32>>(idx)
                .map_err(|e| scan_err(idx, e))?
                .map_or(RawValue::Null, RawValue::Float32),
            ScanKind::Float64 => row
                .try_get::<_, Option<f64>>(idx)
                .map_err(|e| scan_err(idx, e))?
                .map_or(RawValue::Null, RawValue::Float64),
            ScanKind::Text | ScanKind::CastText => row
                .try_get::<_, Option<String>>(idx)
                .map_err(|e| scan_err(idx, e))?
                .map_or(RawValue::Null, RawValue::Text),
            ScanKind::Timestamp => row
                .try_get::<_, Option<chrono::DateTime<chrono::FixedOffset>>>(idx)
                .map_err(|e| scan_err(idx, e))?
                .map_or(RawValue::Null, RawValue::Timestamp),
        };
        values.push(value);
    }
    Ok(RawRow { values })
}

/// Quote a PostgreSQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Display names may carry a namespace prefix; the scan query qualifies
/// with the table's own schema field instead.
fn unqualified(display_name: &str) -> String {
    match display_name.split_once('.') {
        Some((_, name)) => name.to_string(),
        None => display_name.to_string(),
    }
}

fn build_tls_config(ssl_mode: &str) -> Result<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = match ssl_mode {
        "require" => {
            warn!(
                "ssl_mode=require: TLS enabled but server certificate is not verified. \
                 Consider using 'verify-full' for production."
            );
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth()
        }
        "verify-ca" | "verify-full" => {
            info!("ssl_mode={}: certificate verification enabled", ssl_mode);
            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        }
        other => {
            return Err(MigrateError::Config(format!(
                "Invalid ssl_mode '{}'. Valid options: disable, require, verify-ca, verify-full",
                other
            )));
        }
    };

    Ok(config)
}

/// Certificate verifier that accepts any certificate.
///
/// # Security Warning
///
/// This verifier bypasses all certificate validation, making the connection
/// vulnerable to man-in-the-middle attacks. It is only used when the
/// `ssl_mode=require` option is explicitly chosen; use `verify-full` for
/// untrusted networks.
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
