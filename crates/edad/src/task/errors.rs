//! Terminal failures of background tasks.

use std::io;

use thiserror::Error;

/// Reasons a background task ends in the failed state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// Cancellation was requested and honoured at a checkpoint.
    #[error("task cancelled")]
    Cancelled,
    /// The work reported a failure.
    #[error("{message}")]
    Failed {
        /// Human-readable description.
        message: String,
    },
    /// The work panicked.
    #[error("task panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },
    /// The worker thread could not be started.
    #[error("failed to start task thread: {message}")]
    Spawn {
        /// Underlying OS error rendered as text.
        message: String,
    },
}

impl TaskError {
    /// Creates a failure with a custom message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Creates a failure describing an IO error on `context`.
    #[must_use]
    pub fn io(context: &str, source: &io::Error) -> Self {
        Self::Failed {
            message: format!("{context}: {source}"),
        }
    }

    /// Returns true when the task stopped because of cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
