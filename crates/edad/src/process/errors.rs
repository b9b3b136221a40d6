//! Errors that end a process run.

use edad_config::ServiceType;
use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::dispatch::DispatchError;
use crate::protocol::ProtocolError;
use crate::transport::ListenerError;

use super::shutdown::ShutdownError;

/// Errors surfaced while running the service process.
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration or telemetry could not be prepared.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// No service was selected, so there is nothing to run.
    #[error("no service selected; set EDAD_SERVICE or pass --service")]
    ServiceModeDisabled,
    /// The active service has no command to run in batch mode.
    #[error("service `{service}` cannot run in batch mode")]
    BatchUnsupported {
        /// Active service.
        service: ServiceType,
    },
    /// The batch parameters do not form a valid command.
    #[error("invalid batch parameters: {0}")]
    BatchParams(#[source] ProtocolError),
    /// The dispatch core failed to start.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// The command listener failed to bind or stopped abnormally.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// Waiting for a shutdown signal failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

impl RunError {
    /// Process exit code for this failure. Code 1 is reserved for batch
    /// commands that ran but did not succeed.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::ServiceModeDisabled => 3,
            Self::Bootstrap(_)
            | Self::BatchUnsupported { .. }
            | Self::BatchParams(_)
            | Self::Dispatch(_)
            | Self::Listener(_)
            | Self::Shutdown(_) => 2,
        }
    }
}
