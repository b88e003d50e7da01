//! PostgreSQL driver implementation.
//!
//! Provides `PgConnector` and `PostgresConnection`, implementing the driver
//! traits over a single sqlx connection. A transaction is opened as soon as
//! the session is established, so every statement lands in the pending
//! transaction until `commit` finalizes it; `commit` immediately opens a
//! fresh transaction for subsequent statements.

use crate::config::ConnectionConfig;
use crate::db::{ColumnInfo, Connector, DriverConnection, QueryResult, Row, Value};
use crate::error::{Result, StewardError};
use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column as SqlxColumn, Connection as SqlxConnection, Executor, Row as SqlxRow, TypeInfo};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Statement timeout in seconds.
const STATEMENT_TIMEOUT_SECS: u64 = 30;

/// The state of the underlying sqlx session.
enum Session {
    Open(PgConnection),
    Closed,
}

/// A live PostgreSQL session with an explicit pending transaction.
pub struct PostgresConnection {
    session: tokio::sync::Mutex<Session>,
}

/// Opens PostgreSQL sessions. One attempt per call.
#[derive(Debug, Default)]
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>> {
        let conn_str = config.to_connection_string()?;

        let mut conn = PgConnection::connect(&conn_str)
            .await
            .map_err(|e| map_connection_error(e, config))?;

        // Open the session's first pending transaction up front.
        conn.execute("BEGIN")
            .await
            .map_err(|e| StewardError::connection(e.to_string()))?;

        debug!(target = %config.display_string(), "session established");

        Ok(Box::new(PostgresConnection {
            session: tokio::sync::Mutex::new(Session::Open(conn)),
        }))
    }
}

#[async_trait]
impl DriverConnection for PostgresConnection {
    async fn execute(&self, sql: &str) -> Result<u64> {
        let mut session = self.session.lock().await;
        let conn = open_session(&mut session)?;

        let result = tokio::time::timeout(
            Duration::from_secs(STATEMENT_TIMEOUT_SECS),
            sqlx::query(sql).execute(conn),
        )
        .await
        .map_err(|_| {
            StewardError::execution(format!(
                "Statement timed out after {STATEMENT_TIMEOUT_SECS} seconds"
            ))
        })?
        .map_err(|e| StewardError::execution(format_statement_error(e)))?;

        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let mut session = self.session.lock().await;
        let conn = open_session(&mut session)?;

        let start = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_secs(STATEMENT_TIMEOUT_SECS),
            sqlx::query(sql).fetch_all(conn),
        )
        .await
        .map_err(|_| {
            StewardError::execution(format!(
                "Statement timed out after {STATEMENT_TIMEOUT_SECS} seconds"
            ))
        })?
        .map_err(|e| StewardError::execution(format_statement_error(e)))?;

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = result
            .first()
            .map(|first_row| {
                first_row
                    .columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let rows: Vec<Row> = result.iter().map(convert_row).collect();
        let row_count = rows.len();

        Ok(QueryResult {
            columns,
            rows,
            row_count,
            execution_time,
        })
    }

    async fn commit(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let conn = open_session(&mut session)?;

        (&mut *conn)
            .execute("COMMIT")
            .await
            .map_err(|e| StewardError::commit(format_statement_error(e)))?;

        // The commit is durable at this point. If the next transaction cannot
        // be opened, close the session rather than report the commit as
        // failed; subsequent statements surface the closed session.
        if let Err(e) = (&mut *conn).execute("BEGIN").await {
            warn!(error = %e, "session lost after commit, closing");
            *session = Session::Closed;
        }

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        match std::mem::replace(&mut *session, Session::Closed) {
            Session::Open(conn) => conn
                .close()
                .await
                .map_err(|e| StewardError::connection(e.to_string())),
            Session::Closed => Ok(()),
        }
    }
}

/// Borrows the live sqlx connection, or errors if the session was closed.
fn open_session(session: &mut Session) -> Result<&mut PgConnection> {
    match session {
        Session::Open(conn) => Ok(conn),
        Session::Closed => Err(StewardError::connection("session is closed")),
    }
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
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        // For all other types, try to get as string
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> StewardError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        StewardError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        StewardError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        StewardError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        StewardError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        StewardError::connection(error.to_string())
    }
}

/// Formats a statement error with server-side detail if available.
fn format_statement_error(error: sqlx::Error) -> String {
    let mut result = String::new();

    if let Some(db_error) = error.as_database_error() {
        result.push_str("ERROR: ");
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

            if let Some(constraint) = pg_error.constraint() {
                result.push_str("\n  CONSTRAINT: ");
                result.push_str(constraint);
            }
        }
    } else {
        result = error.to_string();
    }

    result
}
