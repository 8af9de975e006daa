use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while running or interpreting VCS commands.
///
/// These are the "unexpected" failures: the tool could not be run, its output
/// could not be understood, or the caller passed something invalid. A tool
/// that ran and complained on stderr is reported as plain text in a result's
/// `vcs_errors` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VcsError {
    #[error("Invalid time range: from {from} is after to {to}")]
    InvalidTimeRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    #[error("{0} executable not found or not runnable")]
    NotAvailable(String),

    #[error("Failed to run `{command}`: {message}")]
    Spawn { command: String, message: String },

    /// Terminated through `cancel`; `partial_stdout` is what it printed so far
    #[error("Command was cancelled: {command}")]
    Cancelled {
        command: String,
        partial_stdout: String,
    },

    #[error("Failed to parse {backend} output: {message}")]
    Parse {
        backend: &'static str,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Command panicked: {0}")]
    Panicked(String),

    #[error("Backend-specific error: {0}")]
    Backend(String),
}

impl VcsError {
    /// Create a Parse error for the given backend name
    pub fn parse(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            backend,
            message: message.into(),
        }
    }

    /// Create a Backend error from any error type
    pub fn backend<E: std::error::Error>(error: E) -> Self {
        Self::Backend(error.to_string())
    }

    /// Turn a caught panic payload into an error value
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked(message)
    }
}

impl From<std::io::Error> for VcsError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<utils::text::TextError> for VcsError {
    fn from(error: utils::text::TextError) -> Self {
        Self::InvalidConfig(error.to_string())
    }
}
