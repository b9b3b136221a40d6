//! Error types raised by service handlers.
//!
//! Each variant maps to a 5xx response status so the dispatch boundary can
//! turn a failed handler into a well-formed result without knowing which
//! service produced it. Client mistakes are caught before a handler runs;
//! once a handler has been invoked, any failure is the service's.

use std::io;

use camino::Utf8PathBuf;
use edad_config::ServiceType;
use thiserror::Error;

use crate::protocol::status;
use crate::task::TaskError;

/// Errors surfaced while a service executes a command.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Parameters name something the service cannot work with.
    #[error("invalid parameters: {message}")]
    InvalidParams {
        /// What was wrong with the parameters.
        message: String,
    },

    /// No collaborator is installed for the service.
    #[error("{service} is not available in this build")]
    Unavailable {
        /// Service lacking a collaborator.
        service: ServiceType,
    },

    /// The collaborator reported a failure.
    #[error("{message}")]
    Failed {
        /// Failure reported by the collaborator.
        message: String,
    },

    /// A filesystem operation failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Path being read or written.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A background task ended without a result.
    #[error("background task failed: {0}")]
    Task(#[from] TaskError),
}

impl ServiceError {
    /// Creates an invalid-parameters error.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// Creates a collaborator failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Wraps an IO error with the path it concerned.
    #[must_use]
    pub fn io(path: impl Into<Utf8PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Response status reported for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unavailable { .. } => status::NOT_IMPLEMENTED,
            Self::InvalidParams { .. } | Self::Failed { .. } | Self::Io { .. } | Self::Task(_) => {
                status::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ServiceError::invalid_params("bad"), 500)]
    #[case(ServiceError::Unavailable { service: ServiceType::Gerber }, 501)]
    #[case(ServiceError::failed("engine crashed"), 500)]
    #[case(ServiceError::io("parts", io::Error::other("denied")), 500)]
    #[case(ServiceError::Task(TaskError::Cancelled), 500)]
    fn maps_errors_to_status(#[case] error: ServiceError, #[case] expected: u16) {
        assert_eq!(error.status_code(), expected);
    }

    #[test]
    fn unavailable_names_the_service() {
        let error = ServiceError::Unavailable {
            service: ServiceType::KicadFootprint,
        };
        assert_eq!(error.to_string(), "kicad-footprint is not available in this build");
    }
}
