//! Mock driver for testing.
//!
//! Provides an in-memory driver implementation that emulates a single table:
//! inserted rows are visible to selects in insertion order, before or after
//! commit. Connect, execute, and commit failures are scriptable so the
//! retry and error paths can be exercised without a server.

use super::{ColumnInfo, Connector, DriverConnection, QueryResult, Row, Value};
use crate::config::ConnectionConfig;
use crate::error::{Result, StewardError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// State shared between a mock connection and the connector that created it,
/// so tests can observe what reached the "driver".
#[derive(Default)]
struct MockState {
    executed: Mutex<Vec<String>>,
    table: Mutex<Vec<Row>>,
    commits: AtomicU32,
    closed: AtomicBool,
}

/// A mock connector with scriptable connect failures.
#[derive(Default)]
pub struct MockConnector {
    failures_before_success: u32,
    attempts: AtomicU32,
    fail_execute_on: Option<String>,
    fail_commit: bool,
    drop_session_after_commit: bool,
    state: Arc<MockState>,
}

impl MockConnector {
    /// Creates a connector whose attempts always succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector that fails the first `n` attempts, then succeeds.
    pub fn failing(n: u32) -> Self {
        Self {
            failures_before_success: n,
            ..Self::default()
        }
    }

    /// Creates a connector whose attempts never succeed.
    pub fn always_failing() -> Self {
        Self::failing(u32::MAX)
    }

    /// Fails any executed statement containing `pattern` with an execution error.
    pub fn with_execute_failure(mut self, pattern: impl Into<String>) -> Self {
        self.fail_execute_on = Some(pattern.into());
        self
    }

    /// Fails every commit with a commit error.
    pub fn with_commit_failure(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    /// Commits succeed but the session is lost right afterwards, as when a
    /// durable commit is followed by a connection drop.
    pub fn with_session_loss_after_commit(mut self) -> Self {
        self.drop_session_after_commit = true;
        self
    }

    /// Number of connect attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Every statement that reached the driver, in order.
    pub fn executed(&self) -> Vec<String> {
        self.state.executed.lock().unwrap().clone()
    }

    /// Number of commits driven to completion.
    pub fn commit_count(&self) -> u32 {
        self.state.commits.load(Ordering::SeqCst)
    }

    /// True once the connection handed out by this connector was closed.
    pub fn was_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Current contents of the emulated table.
    pub fn rows(&self) -> Vec<Row> {
        self.state.table.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if attempt <= self.failures_before_success {
            return Err(StewardError::connection(format!(
                "mock server refused connection (attempt {attempt})"
            )));
        }

        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
            fail_execute_on: self.fail_execute_on.clone(),
            fail_commit: self.fail_commit,
            drop_session_after_commit: self.drop_session_after_commit,
        }))
    }
}

// Lets tests hand a guard the connector while keeping a probe on it.
#[async_trait]
impl Connector for Arc<MockConnector> {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>> {
        Connector::connect(&**self, config).await
    }
}

/// A mock driver connection over the shared in-memory table.
pub struct MockConnection {
    state: Arc<MockState>,
    fail_execute_on: Option<String>,
    fail_commit: bool,
    drop_session_after_commit: bool,
}

impl MockConnection {
    /// Creates a standalone mock connection with fresh state.
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
            fail_execute_on: None,
            fail_commit: false,
            drop_session_after_commit: false,
        }
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnection {
    fn check_open(&self) -> Result<()> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(StewardError::connection("session is closed"));
        }
        Ok(())
    }

    fn record(&self, sql: &str) -> Result<()> {
        self.check_open()?;

        if let Some(pattern) = &self.fail_execute_on {
            if sql.contains(pattern.as_str()) {
                return Err(StewardError::execution(format!(
                    "mock execution failure for statement: {sql}"
                )));
            }
        }

        self.state.executed.lock().unwrap().push(sql.to_string());
        Ok(())
    }
}

#[async_trait]
impl DriverConnection for MockConnection {
    async fn execute(&self, sql: &str) -> Result<u64> {
        self.record(sql)?;

        // INSERT INTO ... VALUES(...) grows the emulated table.
        let is_insert = sql
            .trim_start()
            .get(..6)
            .map_or(false, |head| head.eq_ignore_ascii_case("insert"));
        if is_insert {
            if let Some(row) = parse_values_tuple(sql) {
                self.state.table.lock().unwrap().push(row);
                return Ok(1);
            }
        }

        Ok(0)
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        self.record(sql)?;

        let rows = self.state.table.lock().unwrap().clone();
        let columns = rows
            .first()
            .map(|row| {
                (0..row.len())
                    .map(|i| ColumnInfo::new(format!("col{i}"), "text"))
                    .collect()
            })
            .unwrap_or_default();

        Ok(QueryResult::with_data(columns, rows).with_execution_time(Duration::from_millis(1)))
    }

    async fn commit(&self) -> Result<()> {
        self.check_open()?;

        if self.fail_commit {
            return Err(StewardError::commit("mock server rejected commit"));
        }

        self.state.commits.fetch_add(1, Ordering::SeqCst);

        if self.drop_session_after_commit {
            self.state.closed.store(true, Ordering::SeqCst);
        }

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Extracts the first VALUES(...) tuple from an insert statement.
fn parse_values_tuple(sql: &str) -> Option<Row> {
    let upper = sql.to_uppercase();
    let pos = upper.find("VALUES")?;

    let rest = sql[pos + "VALUES".len()..].trim().trim_end_matches(';').trim();
    let inner = rest.strip_prefix('(')?;
    let end = inner.rfind(')')?;

    Some(
        split_literals(&inner[..end])
            .iter()
            .map(|raw| parse_literal(raw))
            .collect(),
    )
}

/// Splits a comma-separated literal list, respecting single quotes.
fn split_literals(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in s.chars() {
        match c {
            '\'' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }

    if !current.trim().is_empty() || !parts.is_empty() {
        parts.push(current);
    }

    parts
}

/// Parses a single SQL literal into a Value.
fn parse_literal(raw: &str) -> Value {
    let raw = raw.trim();

    if raw.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Some(s) = raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Value::String(s.replace("''", "'"));
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }

    Value::String(raw.to_string())
}
