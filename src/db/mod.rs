//! Database driver abstraction layer.
//!
//! Provides a trait-based seam between the connection guard / statement
//! executor and the underlying wire driver, allowing the Postgres driver
//! and an in-memory mock to be used interchangeably.

mod mock;
mod postgres;
mod types;

pub use mock::{MockConnection, MockConnector};
pub use postgres::{PgConnector, PostgresConnection};
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;

/// A live database session.
///
/// Statements executed through a connection land in its pending transaction
/// until `commit` finalizes them; `close` releases the session and abandons
/// anything uncommitted.
#[async_trait]
pub trait DriverConnection: Send + Sync {
    /// Executes a statement that produces no rows. Returns rows affected.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Executes a statement and fetches all resulting rows.
    async fn query(&self, sql: &str) -> Result<QueryResult>;

    /// Commits the pending transaction.
    ///
    /// A commit error means the transaction was not persisted. If the
    /// session degrades only after a durable commit, the commit still
    /// reports success and later statements fail with a connection error.
    async fn commit(&self) -> Result<()>;

    /// Closes the session.
    async fn close(&self) -> Result<()>;
}

/// Opens database sessions.
///
/// A connector makes exactly one attempt per call; retry policy belongs to
/// the connection guard.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Attempts to open a connection with the given configuration.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>>;
}
