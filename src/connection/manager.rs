//! Connection guard: lifecycle state machine with bounded-retry connect.

use std::fmt;
use std::time::SystemTime;

use tracing::{info, warn};

use crate::config::ConnectionConfig;
use crate::db::{Connector, DriverConnection, PgConnector};
use crate::error::{Result, StewardError};

/// Lifecycle state of a guarded connection.
///
/// Transitions: `Disconnected --connect--> Connected` (or `Failed` once the
/// attempt budget is exhausted), `Connected --disconnect--> Disconnected`,
/// `Failed --connect--> Connected | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live connection; connect() may be called.
    Disconnected,
    /// A connect() retry loop is in flight.
    Connecting,
    /// A live connection is held; statements may execute.
    Connected,
    /// The attempt budget was exhausted. A later connect() retries.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Owns the full lifecycle of a single database connection.
///
/// Exactly one handle exists per guard, created by `connect` and destroyed
/// by `disconnect`. The guard assumes one logical caller; it provides no
/// internal locking and no way to cancel a running retry loop.
pub struct ConnectionGuard {
    config: ConnectionConfig,
    connector: Box<dyn Connector>,
    state: ConnectionState,
    active: Option<Box<dyn DriverConnection>>,
    connected_at: Option<SystemTime>,
}

impl ConnectionGuard {
    /// Creates a guard over the Postgres driver.
    ///
    /// Fails with a configuration error if required keys are missing, before
    /// any connect attempt is made.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        Self::with_connector(config, Box::new(PgConnector))
    }

    /// Creates a guard with a custom connector (used by tests to inject the
    /// mock driver).
    pub fn with_connector(config: ConnectionConfig, connector: Box<dyn Connector>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector,
            state: ConnectionState::Disconnected,
            active: None,
            connected_at: None,
        })
    }

    /// Attempts to open the connection, retrying up to the configured
    /// attempt budget with a fixed delay between attempts.
    ///
    /// Errors if already connected (the live handle is left untouched).
    /// After the budget is exhausted the guard is `Failed` and the error
    /// carries the last driver failure plus the total attempts made; a later
    /// call runs the loop again.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state == ConnectionState::Connected {
            return Err(StewardError::connection(format!(
                "already connected to {}",
                self.config.display_string()
            )));
        }

        self.state = ConnectionState::Connecting;

        let max_attempts = self.config.max_connect_attempts;
        let delay = self.config.retry_delay();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.connector.connect(&self.config).await {
                Ok(handle) => {
                    self.active = Some(handle);
                    self.connected_at = Some(SystemTime::now());
                    self.state = ConnectionState::Connected;
                    info!(
                        attempt,
                        target = %self.config.display_string(),
                        "connection established"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts,
                        target = %self.config.display_string(),
                        error = %e,
                        "connection attempt failed"
                    );
                    last_error = Some(e);

                    if attempt < max_attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        self.state = ConnectionState::Failed;

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts were made".to_string());
        Err(StewardError::connection(format!(
            "Failed to connect to {} after {max_attempts} attempts: {detail}",
            self.config.display_string()
        )))
    }

    /// Closes the live connection.
    ///
    /// Errors (without panicking) when there is nothing to disconnect, so it
    /// is always safe to call.
    pub async fn disconnect(&mut self) -> Result<()> {
        let Some(conn) = self.active.take() else {
            return Err(StewardError::connection("nothing to disconnect"));
        };

        self.state = ConnectionState::Disconnected;
        self.connected_at = None;
        conn.close().await?;

        info!(
            target = %self.config.display_string(),
            "connection closed"
        );
        Ok(())
    }

    /// Returns the live connection handle, only while connected.
    pub fn handle(&self) -> Option<&dyn DriverConnection> {
        self.active.as_deref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if there's a live connection.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// When the current connection was established, while connected.
    pub fn connected_at(&self) -> Option<SystemTime> {
        self.connected_at
    }

    /// The configuration this guard was built with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockConnector;
    use std::sync::Arc;

    fn test_config() -> ConnectionConfig {
        ConnectionConfig {
            host: Some("localhost".to_string()),
            database: Some("test_db".to_string()),
            user: Some("superman".to_string()),
            password: Some("1234567".to_string()),
            retry_delay_secs: 0,
            ..ConnectionConfig::default()
        }
    }

    fn guard_with(connector: MockConnector) -> ConnectionGuard {
        ConnectionGuard::with_connector(test_config(), Box::new(connector)).unwrap()
    }

    #[test]
    fn test_new_guard_is_disconnected() {
        let guard = guard_with(MockConnector::new());
        assert_eq!(guard.state(), ConnectionState::Disconnected);
        assert!(!guard.is_connected());
        assert!(guard.handle().is_none());
        assert!(guard.connected_at().is_none());
    }

    #[test]
    fn test_incomplete_config_fails_before_any_attempt() {
        let config = ConnectionConfig::default();
        let err = ConnectionGuard::with_connector(config, Box::new(MockConnector::new()))
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, StewardError::Config(_)));
    }

    #[tokio::test]
    async fn test_connect_first_attempt() {
        let mut guard = guard_with(MockConnector::new());
        guard.connect().await.unwrap();

        assert_eq!(guard.state(), ConnectionState::Connected);
        assert!(guard.handle().is_some());
        assert!(guard.connected_at().is_some());
    }

    #[tokio::test]
    async fn test_connect_while_connected_is_rejected() {
        let mut guard = guard_with(MockConnector::new());
        guard.connect().await.unwrap();

        let err = guard.connect().await.unwrap_err();
        assert!(err.to_string().contains("already connected"));
        // The live handle is untouched.
        assert_eq!(guard.state(), ConnectionState::Connected);
        assert!(guard.handle().is_some());
    }

    #[tokio::test]
    async fn test_connect_retries_until_success() {
        let connector = MockConnector::failing(2);
        let mut guard = ConnectionGuard::with_connector(test_config(), Box::new(connector)).unwrap();

        guard.connect().await.unwrap();
        assert_eq!(guard.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_connect_exhausts_attempt_budget() {
        let mut config = test_config();
        config.max_connect_attempts = 3;

        let mut guard =
            ConnectionGuard::with_connector(config, Box::new(MockConnector::always_failing()))
                .unwrap();

        let err = guard.connect().await.unwrap_err();
        assert!(matches!(err, StewardError::Connection(_)));
        assert!(err.to_string().contains("3 attempts"));
        assert_eq!(guard.state(), ConnectionState::Failed);
        assert!(guard.handle().is_none());
    }

    #[tokio::test]
    async fn test_attempt_count_matches_budget() {
        let mut config = test_config();
        config.max_connect_attempts = 3;

        let probe = Arc::new(MockConnector::always_failing());
        let mut guard =
            ConnectionGuard::with_connector(config, Box::new(probe.clone())).unwrap();

        guard.connect().await.unwrap_err();
        assert_eq!(probe.attempts(), 3);
    }

    #[tokio::test]
    async fn test_failed_guard_can_reconnect() {
        let mut config = test_config();
        config.max_connect_attempts = 2;

        // Fails attempts 1-3; the first connect() burns attempts 1 and 2,
        // the second fails attempt 3 and succeeds on attempt 4.
        let connector = MockConnector::failing(3);
        let mut guard = ConnectionGuard::with_connector(config, Box::new(connector)).unwrap();

        guard.connect().await.unwrap_err();
        assert_eq!(guard.state(), ConnectionState::Failed);

        guard.connect().await.unwrap();
        assert_eq!(guard.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_disconnect_without_connection() {
        let mut guard = guard_with(MockConnector::new());
        let err = guard.disconnect().await.unwrap_err();
        assert!(err.to_string().contains("nothing to disconnect"));
        assert_eq!(guard.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_closes_connection() {
        let probe = Arc::new(MockConnector::new());
        let mut guard =
            ConnectionGuard::with_connector(test_config(), Box::new(probe.clone())).unwrap();

        guard.connect().await.unwrap();
        guard.disconnect().await.unwrap();

        assert_eq!(guard.state(), ConnectionState::Disconnected);
        assert!(guard.handle().is_none());
        assert!(guard.connected_at().is_none());
        assert!(probe.was_closed());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Failed.to_string(), "failed");
    }
}
