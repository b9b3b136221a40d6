//! Error types for command dispatch failures.
//!
//! Every variant maps to a response status so a failed command still yields
//! a well-formed result for the client.

use std::io;

use edad_config::ServiceType;
use thiserror::Error;

use crate::protocol::{CommandResult, status};
use crate::services::ServiceError;

/// Errors surfaced while routing or executing a command.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No service answers to the command name.
    #[error("unknown command: {name}")]
    UnknownCommand {
        /// Name as sent by the client.
        name: String,
    },

    /// The command exists but the active service does not enable it.
    #[error("{service} commands are disabled while running the {active} service")]
    ServiceDisabled {
        /// Service owning the command.
        service: ServiceType,
        /// Service this process runs.
        active: ServiceType,
    },

    /// The command is enabled but no handler is installed for it.
    #[error("no handler installed for {service}")]
    MissingHandler {
        /// Service without a handler.
        service: ServiceType,
    },

    /// The handler returned an error.
    #[error("{service} failed: {source}")]
    Service {
        /// Service whose handler failed.
        service: ServiceType,
        /// Error returned by the handler.
        #[source]
        source: ServiceError,
    },

    /// The handler panicked; the executor survived.
    #[error("{service} handler panicked: {message}")]
    HandlerPanicked {
        /// Service whose handler panicked.
        service: ServiceType,
        /// Panic payload rendered as text.
        message: String,
    },

    /// The dispatch core is shutting down or gone.
    #[error("service is shutting down")]
    Unavailable,

    /// The executor thread could not be started.
    #[error("failed to start dispatch executor: {0}")]
    Spawn(#[source] io::Error),
}

impl DispatchError {
    /// Creates an unknown-command error.
    #[must_use]
    pub fn unknown_command(name: impl Into<String>) -> Self {
        Self::UnknownCommand { name: name.into() }
    }

    /// Creates a disabled-service error.
    #[must_use]
    pub const fn service_disabled(service: ServiceType, active: ServiceType) -> Self {
        Self::ServiceDisabled { service, active }
    }

    /// Response status reported for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::UnknownCommand { .. } => status::NOT_FOUND,
            Self::ServiceDisabled { .. } => status::FORBIDDEN,
            Self::MissingHandler { .. } => status::NOT_IMPLEMENTED,
            Self::Service { source, .. } => source.status_code(),
            Self::HandlerPanicked { .. } | Self::Spawn(_) => status::INTERNAL_SERVER_ERROR,
            Self::Unavailable => status::SERVICE_UNAVAILABLE,
        }
    }

    /// Converts the error into the result sent to the client.
    #[must_use]
    pub fn to_command_result(&self) -> CommandResult {
        CommandResult::text(self.status_code(), format!("{self}\n"))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(DispatchError::unknown_command("bogus"), 404, "unknown command: bogus\n")]
    #[case(
        DispatchError::service_disabled(ServiceType::Gerber, ServiceType::Drc),
        403,
        "gerber commands are disabled while running the drc service\n"
    )]
    #[case(
        DispatchError::MissingHandler { service: ServiceType::Svg },
        501,
        "no handler installed for svg\n"
    )]
    #[case(
        DispatchError::Service {
            service: ServiceType::Database,
            source: ServiceError::invalid_params("no such folder"),
        },
        500,
        "database failed: invalid parameters: no such folder\n"
    )]
    #[case(
        DispatchError::HandlerPanicked {
            service: ServiceType::Drc,
            message: String::from("boom"),
        },
        500,
        "drc handler panicked: boom\n"
    )]
    #[case(DispatchError::Unavailable, 503, "service is shutting down\n")]
    fn renders_command_results(
        #[case] error: DispatchError,
        #[case] code: u16,
        #[case] body: &str,
    ) {
        let result = error.to_command_result();
        assert_eq!(result.status_code(), code);
        assert_eq!(result.body(), body);
    }
}
