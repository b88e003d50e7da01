//! Logging initialization for db-steward.
//!
//! The core only emits structured `tracing` events (lifecycle transitions,
//! attempt numbers, statement outcomes); formatting belongs to whatever
//! subscriber the embedding application installs. This module offers a
//! convenience initializer for programs that do not bring their own.

use tracing_subscriber::EnvFilter;

/// Initializes an env-filtered subscriber writing to stderr.
///
/// Honors `RUST_LOG`, defaulting to `info`. Returns quietly if a global
/// subscriber is already installed, so tests can call it repeatedly.
pub fn init_stderr_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
