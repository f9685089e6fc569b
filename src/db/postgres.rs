//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient`
//! trait using sqlx. Every call opens its own connection, runs one prepared
//! statement and closes the connection again; there is no pool and no retry.

use crate::config::ConnectionConfig;
use crate::db::{ColumnInfo, DatabaseClient, QueryParam, ResultSet, Row, Value};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column as SqlxColumn, Connection, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef};
use std::fmt::Write as _;
use std::time::{Duration, Instant};
use tracing::debug;

/// PostgreSQL database client.
#[derive(Debug, Clone)]
pub struct PostgresClient {
    options: PgConnectOptions,
    connect_timeout: Duration,
    host: String,
    port: u16,
    user: String,
    database: String,
}

impl PostgresClient {
    /// Creates a client for the given connection settings.
    ///
    /// No connection is opened until a statement is executed.
    pub fn new(config: &ConnectionConfig, connect_timeout: Duration) -> Self {
        let mut options = PgConnectOptions::new()
            .host(config.host_or_default())
            .port(config.port)
            .username(config.user_or_default())
            .database(config.database_or_default());
        if let Some(password) = &config.password {
            options = options.password(password);
        }

        Self {
            options,
            connect_timeout,
            host: config.host_or_default().to_string(),
            port: config.port,
            user: config.user_or_default().to_string(),
            database: config.database_or_default().to_string(),
        }
    }

    async fn open(&self) -> Result<PgConnection> {
        tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&self.options))
            .await
            .map_err(|_| {
                GatewayError::connection(format!(
                    "Connection to {}:{} timed out after {} seconds.",
                    self.host,
                    self.port,
                    self.connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| self.map_connection_error(e))
    }

    /// Maps sqlx connection errors to user-friendly messages.
    fn map_connection_error(&self, error: sqlx::Error) -> GatewayError {
        let error_str = error.to_string().to_lowercase();

        if error_str.contains("connection refused") || error_str.contains("could not connect") {
            GatewayError::connection(format!(
                "Cannot connect to {}:{}. Check that the server is running.",
                self.host, self.port
            ))
        } else if error_str.contains("password authentication failed")
            || error_str.contains("authentication failed")
        {
            GatewayError::connection(format!(
                "Authentication failed for user '{}'.",
                self.user
            ))
        } else if error_str.contains("does not exist") && error_str.contains("database") {
            GatewayError::connection(format!("Database '{}' does not exist.", self.database))
        } else {
            GatewayError::connection(error.to_string())
        }
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn execute(&self, sql: &str, params: &[QueryParam]) -> Result<ResultSet> {
        let start = Instant::now();
        let mut conn = self.open().await?;

        let outcome = run_statement(&mut conn, sql, params).await;

        if let Err(e) = conn.close().await {
            debug!(error = %e, "Error while closing database connection");
        }

        if let Ok(result) = &outcome {
            debug!(
                rows = result.row_count(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Statement executed"
            );
        }
        outcome
    }
}

/// Prepares, binds and runs one statement on an open connection.
async fn run_statement(
    conn: &mut PgConnection,
    sql: &str,
    params: &[QueryParam],
) -> Result<ResultSet> {
    let statement = (&mut *conn)
        .prepare(sql)
        .await
        .map_err(|e| GatewayError::query(format_query_error(e)))?;

    // Taken from the statement so empty results still report their columns.
    let columns: Vec<ColumnInfo> = statement
        .columns()
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect();

    let mut query = statement.query();
    for param in params {
        query = match param {
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Text(s) => query.bind(s.clone()),
        };
    }

    let rows = query
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| GatewayError::query(format_query_error(e)))?;

    Ok(ResultSet {
        columns,
        rows: rows.iter().map(convert_row).collect(),
    })
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => decode(row, index, Value::Bool),

        "INT2" | "SMALLINT" => decode(row, index, |v: i16| Value::Int(v as i64)),

        "INT4" | "INT" | "INTEGER" => decode(row, index, |v: i32| Value::Int(v as i64)),

        "INT8" | "BIGINT" => decode(row, index, Value::Int),

        "FLOAT4" | "REAL" => decode(row, index, |v: f32| Value::Float(v as f64)),

        "FLOAT8" | "DOUBLE PRECISION" => decode(row, index, Value::Float),

        "BYTEA" => decode(row, index, Value::Bytes),

        "NUMERIC" => raw_bytes(row, index)
            .map(|bytes| {
                decode_numeric(bytes)
                    .map(Value::String)
                    .unwrap_or_else(|| Value::String("<NUMERIC>".to_string()))
            })
            .unwrap_or(Value::Null),

        "TIMESTAMPTZ" => decode(row, index, |v: chrono::DateTime<chrono::Utc>| {
            Value::String(v.to_string())
        }),

        "TIMESTAMP" => decode(row, index, |v: chrono::NaiveDateTime| {
            Value::String(v.to_string())
        }),

        "DATE" => decode(row, index, |v: chrono::NaiveDate| Value::String(v.to_string())),

        "TIME" => decode(row, index, |v: chrono::NaiveTime| Value::String(v.to_string())),

        "UUID" => decode(row, index, |v: uuid::Uuid| Value::String(v.to_string())),

        "JSON" | "JSONB" => decode(row, index, |v: serde_json::Value| {
            Value::String(v.to_string())
        }),

        _ => match row.try_get::<Option<String>, _>(index) {
            Ok(Some(s)) => Value::String(s),
            Ok(None) => Value::Null,
            // Not a text-compatible type: show the raw value if it happens to
            // be UTF-8, otherwise a type placeholder.
            Err(_) => raw_bytes(row, index)
                .map(|bytes| match std::str::from_utf8(bytes) {
                    Ok(s) => Value::String(s.to_string()),
                    Err(_) => Value::String(format!("<{type_name}>")),
                })
                .unwrap_or(Value::Null),
        },
    }
}

/// Decodes a nullable column, mapping NULL and decode failures to `Value::Null`.
fn decode<'r, T, F>(row: &'r PgRow, index: usize, wrap: F) -> Value
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    F: FnOnce(T) -> Value,
{
    row.try_get::<Option<T>, _>(index)
        .ok()
        .flatten()
        .map(wrap)
        .unwrap_or(Value::Null)
}

/// Returns the undecoded bytes of a column, or `None` for NULL.
fn raw_bytes(row: &PgRow, index: usize) -> Option<&[u8]> {
    let raw = row.try_get_raw(index).ok()?;
    if raw.is_null() {
        return None;
    }
    raw.as_bytes().ok()
}

/// Renders a NUMERIC value from its binary wire form.
///
/// Layout: ndigits, weight, sign, dscale (all 16-bit big-endian), then
/// `ndigits` base-10000 digits. The value is the sum of
/// `digit[i] * 10000^(weight - i)`.
fn decode_numeric(bytes: &[u8]) -> Option<String> {
    let read_i16 = |offset: usize| -> Option<i16> {
        bytes
            .get(offset..offset + 2)
            .map(|b| i16::from_be_bytes([b[0], b[1]]))
    };

    let ndigits = usize::try_from(read_i16(0)?).ok()?;
    let weight = i32::from(read_i16(2)?);
    let sign = read_i16(4)? as u16;
    let dscale = read_i16(6)? as u16 as usize;

    match sign {
        0xC000 => return Some("NaN".to_string()),
        0xD000 => return Some("Infinity".to_string()),
        0xF000 => return Some("-Infinity".to_string()),
        _ => {}
    }

    let digits = (0..ndigits)
        .map(|i| read_i16(8 + i * 2))
        .collect::<Option<Vec<i16>>>()?;
    let digit_at = |pos: i32| -> i16 {
        usize::try_from(pos)
            .ok()
            .and_then(|p| digits.get(p).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        for pos in 0..=weight {
            let digit = digit_at(pos);
            let _ = if pos == 0 {
                write!(out, "{digit}")
            } else {
                write!(out, "{digit:04}")
            };
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut pos = weight + 1;
        while fraction.len() < dscale {
            let _ = write!(fraction, "{:04}", digit_at(pos));
            pos += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Some(out)
}

/// Formats a query error with detail and hint if available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
