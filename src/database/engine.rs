//! DuckDB-based row source
//!
//! Provides unified access to PostgreSQL, MySQL, SQLite via DuckDB extensions.
//! External databases are attached read-only as `source_db`.

use super::generator::DuckDbQueryGenerator;
use super::types::{mask_password, DatabaseConnectionDef, DatabaseKind};
use crate::catalog::{Field, FieldType};
use crate::error::{Error, Result};
use crate::query::{
    Binding, QueryParameters, RowStream, SelectQuerier, SelectQuery, SelectQueryGenerator,
    SelectQuerySpec,
};
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use duckdb::types::{TimeUnit, Value};
use duckdb::Connection;
use futures::StreamExt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Catalog alias of an attached source database
const SOURCE_CATALOG: &str = "source_db";

/// Rows buffered between the query thread and the reader
const DEFAULT_ROW_BUFFER: usize = 1_000;
const MAX_ROW_BUFFER: usize = 65_536;

/// `SelectQuerier` backed by an embedded DuckDB instance
pub struct DuckDbQuerier {
    /// Connection every query clones from
    conn: Arc<Mutex<Connection>>,
    kind: DatabaseKind,
    /// Connection string used (for logging)
    connection_string: String,
    /// Whether the source is attached as `source_db`
    attached: bool,
    generator: DuckDbQueryGenerator,
}

impl DuckDbQuerier {
    /// Open DuckDB and attach the configured source database
    pub fn new(connection: &DatabaseConnectionDef) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::config(format!("Failed to create DuckDB connection: {e}")))?;
        let connection_string = connection.resolve_connection_string()?;

        let attached = match connection.engine.extension() {
            Some(extension) => {
                conn.execute_batch(&format!("INSTALL {extension}; LOAD {extension};"))
                    .map_err(|e| {
                        Error::config(format!("Failed to load {extension} extension: {e}"))
                    })?;
                let kind = extension.to_uppercase();
                conn.execute_batch(&format!(
                    "ATTACH '{}' AS {SOURCE_CATALOG} (TYPE {kind}, READ_ONLY);",
                    connection_string.replace('\'', "''")
                ))
                .map_err(|e| Error::config(format!("Failed to attach {}: {e}", connection.engine)))?;
                true
            }
            None if connection_string == ":memory:" => false,
            None => {
                conn.execute_batch(&format!(
                    "ATTACH '{}' AS {SOURCE_CATALOG} (READ_ONLY);",
                    connection_string.replace('\'', "''")
                ))
                .map_err(|e| Error::config(format!("Failed to attach DuckDB: {e}")))?;
                true
            }
        };

        tracing::info!(
            engine = %connection.engine,
            connection = %mask_password(&connection_string),
            "Opened source database"
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            kind: connection.engine,
            connection_string,
            attached,
            generator: if attached {
                DuckDbQueryGenerator::with_catalog(SOURCE_CATALOG)
            } else {
                DuckDbQueryGenerator::new()
            },
        })
    }

    /// Writable in-memory database, tables live in the default catalog
    pub fn open_in_memory() -> Result<Self> {
        Self::new(&DatabaseConnectionDef::in_memory())
    }

    /// Run statements directly, e.g. to create and fill tables
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.connection().execute_batch(sql)?;
        Ok(())
    }

    /// Test database connection
    pub fn check_connection(&self) -> Result<()> {
        let query = match self.kind {
            DatabaseKind::Postgres => "SELECT 1 FROM source_db.pg_catalog.pg_tables LIMIT 1",
            DatabaseKind::Mysql => "SELECT 1 FROM source_db.information_schema.tables LIMIT 1",
            DatabaseKind::Sqlite => "SELECT 1 FROM source_db.sqlite_master LIMIT 1",
            DatabaseKind::Duckdb => "SELECT 1",
        };

        let conn = self.connection();
        let check = |e: duckdb::Error| Error::config(format!("Connection check failed: {e}"));
        let mut stmt = conn.prepare(query).map_err(check)?;
        let mut rows = stmt.query([]).map_err(check)?;
        rows.next().map_err(check)?;
        Ok(())
    }

    /// Get list of tables in the source database, as `schema.table`
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let query = if self.attached {
            "SELECT table_schema || '.' || table_name AS full_name
             FROM information_schema.tables
             WHERE table_catalog = 'source_db'
               AND table_schema NOT IN ('pg_catalog', 'information_schema', 'mysql', 'performance_schema', 'sys')
             ORDER BY table_schema, table_name"
        } else {
            "SELECT table_schema || '.' || table_name AS full_name
             FROM information_schema.tables
             WHERE table_catalog = current_database()
             ORDER BY table_schema, table_name"
        };

        let conn = self.connection();
        let mut stmt = conn
            .prepare(query)
            .map_err(|e| Error::config(format!("Failed to prepare query: {e}")))?;
        let tables = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| Error::config(format!("Failed to query tables: {e}")))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(tables)
    }

    /// Get database kind
    pub fn kind(&self) -> DatabaseKind {
        self.kind
    }

    pub fn generator(&self) -> &DuckDbQueryGenerator {
        &self.generator
    }

    /// Get connection string (for logging - password masked)
    pub fn connection_info(&self) -> String {
        mask_password(&self.connection_string)
    }

    fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DuckDbQuerier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbQuerier")
            .field("kind", &self.kind)
            .field("connection", &self.connection_info())
            .field("attached", &self.attached)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SelectQuerier for DuckDbQuerier {
    async fn execute_query(
        &self,
        spec: &SelectQuerySpec,
        parameters: QueryParameters,
    ) -> Result<RowStream> {
        let query = self.generator.generate(spec)?;
        tracing::debug!(
            sql = %query.sql,
            bindings = query.bindings.len(),
            fetch_size = ?parameters.fetch_size,
            "Executing query"
        );

        // Each query runs on its own connection to the shared database
        let conn = self.connection().try_clone()?;
        let buffer = parameters
            .fetch_size
            .unwrap_or(DEFAULT_ROW_BUFFER)
            .clamp(1, MAX_ROW_BUFFER);
        let (tx, rx) = mpsc::channel(buffer);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = stream_rows(&conn, &query, &tx) {
                // The reader may already be gone
                let _ = tx.blocking_send(Err(e));
            }
        });

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|row| (row, rx))
        })
        .boxed())
    }
}

/// Execute on the calling thread, sending rows until done or the receiver is dropped
fn stream_rows(
    conn: &Connection,
    query: &SelectQuery,
    tx: &mpsc::Sender<Result<JsonObject>>,
) -> Result<()> {
    let mut stmt = conn.prepare(&query.sql)?;
    let params = query.bindings.iter().map(binding_value);
    let mut rows = stmt.query(duckdb::params_from_iter(params))?;
    while let Some(row) = rows.next()? {
        let mut record = JsonObject::with_capacity(query.columns.len());
        for (i, field) in query.columns.iter().enumerate() {
            let value: Value = row.get(i)?;
            record.insert(field.id.clone(), duckdb_value_to_json(value, field));
        }
        if tx.blocking_send(Ok(record)).is_err() {
            tracing::debug!("Row receiver dropped, stopping query");
            break;
        }
    }
    Ok(())
}

/// DuckDB parameter for a binding; the statement casts it to the column type
fn binding_value(binding: &Binding) -> Value {
    match &binding.value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => match (binding.field_type, n.as_i64()) {
            (FieldType::Integer, Some(i)) => Value::BigInt(i),
            _ => Value::Text(n.to_string()),
        },
        JsonValue::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// Convert DuckDB Value to JSON Value
fn duckdb_value_to_json(value: Value, field: &Field) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(b),
        Value::TinyInt(i) => JsonValue::Number(i.into()),
        Value::SmallInt(i) => JsonValue::Number(i.into()),
        Value::Int(i) => JsonValue::Number(i.into()),
        Value::BigInt(i) => JsonValue::Number(i.into()),
        Value::HugeInt(i) => i64::try_from(i)
            .map_or_else(|_| JsonValue::String(i.to_string()), JsonValue::from),
        Value::UTinyInt(i) => JsonValue::Number(i.into()),
        Value::USmallInt(i) => JsonValue::Number(i.into()),
        Value::UInt(i) => JsonValue::Number(i.into()),
        Value::UBigInt(i) => JsonValue::Number(i.into()),
        Value::Float(f) => {
            serde_json::Number::from_f64(f64::from(f)).map_or(JsonValue::Null, JsonValue::Number)
        }
        Value::Double(f) => serde_json::Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number),
        Value::Decimal(d) => JsonValue::String(d.to_string()),
        Value::Text(s) => JsonValue::String(s),
        Value::Blob(b) => JsonValue::String(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b,
        )),
        Value::Timestamp(unit, t) => {
            let micros = to_micros(unit, t);
            let format = match field.field_type {
                FieldType::TimestampWithTimezone => "%Y-%m-%dT%H:%M:%S%.6f+00:00",
                _ => "%Y-%m-%dT%H:%M:%S%.6f",
            };
            chrono::DateTime::from_timestamp_micros(micros)
                .map(|dt| JsonValue::String(dt.naive_utc().format(format).to_string()))
                .unwrap_or(JsonValue::Number(t.into()))
        }
        Value::Date32(d) => {
            // Days since epoch (719163 is the number of days from 1 CE to 1970-01-01)
            chrono::NaiveDate::from_num_days_from_ce_opt(d + 719_163)
                .map(|date| JsonValue::String(date.format("%Y-%m-%d").to_string()))
                .unwrap_or(JsonValue::Number(d.into()))
        }
        Value::Time64(unit, t) => {
            let micros = to_micros(unit, t);
            let secs = micros / 1_000_000;
            JsonValue::String(format!(
                "{:02}:{:02}:{:02}.{:06}",
                secs / 3600,
                (secs % 3600) / 60,
                secs % 60,
                micros % 1_000_000
            ))
        }
        other => JsonValue::String(format!("{other:?}")),
    }
}
