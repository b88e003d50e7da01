//! Statement execution against a guarded connection.
//!
//! Classifies each submitted statement, rejects it when the classification
//! does not match the operation the caller invoked, and otherwise executes
//! it immediately against the guard's live handle. Writes land in the
//! connection's pending transaction until `commit` finalizes them; there is
//! no in-memory batching and no retry at this layer.

use tracing::{debug, info};

use crate::connection::ConnectionGuard;
use crate::db::{DriverConnection, QueryResult};
use crate::error::{Result, StewardError};
use crate::sql::{classify, SqlKind};

/// Executes the supported statement vocabulary against a live connection.
///
/// Borrows the guard for the lifetime of a session; construct it after
/// `connect()` and drop it before `disconnect()`.
pub struct StatementExecutor<'a> {
    guard: &'a ConnectionGuard,
    pending: usize,
}

impl<'a> StatementExecutor<'a> {
    /// Creates an executor bound to the given guard.
    pub fn new(guard: &'a ConnectionGuard) -> Self {
        Self { guard, pending: 0 }
    }

    /// Number of write statements executed since the last commit.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Executes a CREATE TABLE statement.
    ///
    /// Rejects anything that does not classify as `Create` before it can
    /// reach the driver.
    pub async fn create(&mut self, sql: &str) -> Result<()> {
        let conn = self.validated_handle(sql, SqlKind::Create)?;
        conn.execute(sql).await?;

        self.pending += 1;
        info!(statement = sql, "create statement executed, commit pending");
        Ok(())
    }

    /// Executes an INSERT INTO statement.
    pub async fn insert(&mut self, sql: &str) -> Result<()> {
        let conn = self.validated_handle(sql, SqlKind::Insert)?;
        conn.execute(sql).await?;

        self.pending += 1;
        info!(statement = sql, "insert statement executed, commit pending");
        Ok(())
    }

    /// Executes a SELECT statement and returns all resulting rows.
    ///
    /// The result reflects every statement executed in the current session,
    /// committed or not. The caller owns the returned rows.
    pub async fn select(&self, sql: &str) -> Result<QueryResult> {
        let conn = self.validated_handle(sql, SqlKind::Select)?;
        let result = conn.query(sql).await?;

        info!(
            statement = sql,
            rows = result.row_count,
            "select statement executed"
        );
        Ok(result)
    }

    /// Commits the pending transaction.
    ///
    /// A no-op commit (nothing pending) succeeds. A commit failure means the
    /// transaction was not persisted; it is surfaced verbatim together with
    /// the number of statements that were pending, and nothing is retried.
    /// A session that degrades only after a durable commit still reports
    /// success here, with later statements failing on the lost connection.
    pub async fn commit(&mut self) -> Result<()> {
        let conn = self.live_handle()?;

        debug!(statements = self.pending, "attempting commit");
        match conn.commit().await {
            Ok(()) => {
                info!(statements = self.pending, "commit successful");
                self.pending = 0;
                Ok(())
            }
            Err(StewardError::Commit(msg)) => Err(StewardError::commit(format!(
                "{msg} ({} statements pending)",
                self.pending
            ))),
            Err(other) => Err(other),
        }
    }

    /// Classifies `sql`, checks it against the invoked operation, and
    /// returns the live handle. Validation failures never touch the driver.
    fn validated_handle(&self, sql: &str, expected: SqlKind) -> Result<&'a dyn DriverConnection> {
        let kind = classify(sql);
        if kind != expected {
            return Err(StewardError::validation(format!(
                "expected {expected} statement, got {kind}: {sql}"
            )));
        }

        self.live_handle()
    }

    fn live_handle(&self) -> Result<&'a dyn DriverConnection> {
        self.guard.handle().ok_or_else(|| {
            StewardError::connection(format!(
                "not connected (state: {}); connect() must succeed first",
                self.guard.state()
            ))
        })
    }
}
