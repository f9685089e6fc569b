//! Error types for the gateway.
//!
//! Defines the main error enum used throughout the application. Policy
//! rejections are user-facing outcomes and are kept apart from execution
//! and transport failures so each front-end can map them to its own reply.

use thiserror::Error;

/// Why a request was turned away before reaching the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The table name does not match the identifier grammar.
    InvalidName,
    /// The SQL text failed the read-only safety gate.
    UnsafeQuery,
    /// The row limit could not be parsed as an integer.
    InvalidLimit,
}

impl Rejection {
    /// Returns the message shown to the caller.
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidName => "Invalid table name.",
            Self::UnsafeQuery => "Invalid or disallowed query.",
            Self::InvalidLimit => "Invalid limit.",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The request was rejected by the identifier or query policy.
    #[error("{0}")]
    Rejected(Rejection),

    /// The HTTP credential did not match the configured shared secret.
    #[error("Invalid API key")]
    Unauthorized,

    /// The chat identity is not on the allow-list.
    #[error("Access denied.")]
    AccessDenied,

    /// Database connection errors (host unreachable, auth failed, timeout).
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors reported by the database engine.
    #[error("Query error: {0}")]
    Query(String),

    /// The chat transport refused or failed to deliver a message.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration errors (invalid connection string, unreadable file).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (worker panics, unexpected states).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a transport error with the given message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true for outcomes caused by the caller rather than the server.
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            Self::Rejected(_) | Self::Unauthorized | Self::AccessDenied
        )
    }

    /// Returns true when the database (not the policy) produced the failure.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Query(_) | Self::Internal(_))
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "Rejected",
            Self::Unauthorized => "Unauthorized",
            Self::AccessDenied => "Access Denied",
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Transport(_) => "Transport Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

impl From<Rejection> for GatewayError {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

/// Result type alias using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;
