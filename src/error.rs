//! Error types for cfdi-lab.
//!
//! `LabError` covers application failures (configuration, persistence, I/O).
//! `ExecutionError` is the outcome of a request against the backend and is the
//! value stored in the session when an action fails.

use std::fmt;
use thiserror::Error;

/// Main error type for application-level operations.
#[derive(Error, Debug)]
pub enum LabError {
    /// Configuration errors (invalid config file, bad base URL, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// State database errors (open, migrate, read/write preferences).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Filesystem errors (export, log directory).
    #[error("I/O error: {0}")]
    Io(String),

    /// A backend request failed where the caller needs an application error.
    #[error("Backend error: {0}")]
    Backend(#[from] ExecutionError),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LabError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a persistence error with the given message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Creates an I/O error with the given message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Persistence(_) => "Persistence Error",
            Self::Io(_) => "I/O Error",
            Self::Backend(_) => "Backend Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using LabError.
pub type Result<T> = std::result::Result<T, LabError>;

/// Classification of a failed backend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request did not settle before the transport deadline.
    Timeout,
    /// No response reached the client, or the client is known to be offline.
    NetworkUnreachable,
    /// The backend answered with a non-success status.
    ServerError,
    /// Anything else (undecodable body, client construction failure).
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::NetworkUnreachable => "network_unreachable",
            Self::ServerError => "server_error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed backend request, classified for the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ExecutionError {
    kind: ErrorKind,
    message: String,
    /// Set for errors produced locally because the backend is not online.
    blocked: bool,
}

impl ExecutionError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            blocked: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkUnreachable, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServerError, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// The pseudo-error recorded when an action is refused because the
    /// backend is not online. No request is attempted.
    pub fn offline(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NetworkUnreachable,
            message: message.into(),
            blocked: true,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if this error was produced locally by the offline gate.
    pub fn is_offline_block(&self) -> bool {
        self.blocked
    }
}
