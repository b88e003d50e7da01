//! Error types for db-steward.
//!
//! Defines the main error enum used throughout the library.

use thiserror::Error;

/// Main error type for db-steward operations.
#[derive(Error, Debug)]
pub enum StewardError {
    /// Configuration errors (missing connection parameters, invalid config file, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection lifecycle errors (attempt failed, retries exhausted, not connected, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement validation errors (kind mismatch, unsupported statement kind).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Driver-level execution errors (table already exists, constraint violations, etc.)
    #[error("Execution error: {0}")]
    Execution(String),

    /// Commit errors (driver rejected the pending transaction).
    #[error("Commit error: {0}")]
    Commit(String),
}

impl StewardError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a commit error with the given message.
    pub fn commit(msg: impl Into<String>) -> Self {
        Self::Commit(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Connection(_) => "Connection Error",
            Self::Validation(_) => "Validation Error",
            Self::Execution(_) => "Execution Error",
            Self::Commit(_) => "Commit Error",
        }
    }

    /// Returns true if the failure is local to the submitted input and will
    /// never succeed on retry (the caller must fix the input instead).
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Validation(_))
    }
}

/// Result type alias using StewardError.
pub type Result<T> = std::result::Result<T, StewardError>;
