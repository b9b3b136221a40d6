//! Service handlers executed by the dispatch core.
//!
//! A handler receives the raw parameter text of a command and returns a
//! [`CommandResult`]. Handlers live on the executor thread, so they must be
//! `Send` but need not be `Sync`, and they may keep mutable state between
//! commands. The heavy lifting is delegated to collaborator traits
//! ([`DrcEngine`], [`Exporter`], [`DatabaseRegenerator`]) so real engines can
//! be plugged in without touching dispatch.

mod database;
mod drc;
mod errors;
mod export;
mod placeholder;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use edad_config::{Config, ServiceType};

use crate::protocol::CommandResult;
use crate::task::{ProgressSink, TracingProgressSink};

pub use self::database::{
    DatabaseRegenerator, DatabaseService, DatabaseSummary, PartsIndexRegenerator,
};
pub use self::drc::{DrcEngine, DrcIssue, DrcReport, DrcService};
pub use self::errors::ServiceError;
pub use self::export::{ExportService, Exporter};
pub use self::placeholder::{UnavailableDrcEngine, UnavailableExporter};

pub(crate) const SERVICES_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::services");

/// Executes commands for one service.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceHandler: Send {
    /// Runs the service with the raw parameter text of a command.
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] when the service cannot complete; the
    /// dispatch core converts it into an error response.
    fn handle(&mut self, params: &str) -> Result<CommandResult, ServiceError>;
}

impl<F> ServiceHandler for F
where
    F: FnMut(&str) -> Result<CommandResult, ServiceError> + Send,
{
    fn handle(&mut self, params: &str) -> Result<CommandResult, ServiceError> {
        self(params)
    }
}

/// Handlers keyed by the service they implement.
#[derive(Default)]
pub struct ServiceHandlers {
    handlers: HashMap<ServiceType, Box<dyn ServiceHandler>>,
}

impl fmt::Debug for ServiceHandlers {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut services: Vec<String> = self.handlers.keys().map(ToString::to_string).collect();
        services.sort();
        formatter
            .debug_struct("ServiceHandlers")
            .field("services", &services)
            .finish()
    }
}

impl ServiceHandlers {
    /// Creates an empty handler table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `service`, replacing any previous handler.
    pub fn insert<H>(&mut self, service: ServiceType, handler: H)
    where
        H: ServiceHandler + 'static,
    {
        self.handlers.insert(service, Box::new(handler));
    }

    /// Builder form of [`ServiceHandlers::insert`].
    #[must_use]
    pub fn with<H>(mut self, service: ServiceType, handler: H) -> Self
    where
        H: ServiceHandler + 'static,
    {
        self.insert(service, handler);
        self
    }

    /// Returns true when a handler is registered for `service`.
    #[must_use]
    pub fn contains(&self, service: ServiceType) -> bool {
        self.handlers.contains_key(&service)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true when no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub(crate) fn get_mut(&mut self, service: ServiceType) -> Option<&mut dyn ServiceHandler> {
        self.handlers
            .get_mut(&service)
            .map(|handler| handler.as_mut() as &mut dyn ServiceHandler)
    }
}

const EXPORT_SERVICES: [ServiceType; 7] = [
    ServiceType::Gerber,
    ServiceType::Geda,
    ServiceType::KicadSchematic,
    ServiceType::KicadFootprint,
    ServiceType::Svg,
    ServiceType::ExportAll,
    ServiceType::Example,
];

/// Builds the handler table shipped with the daemon.
///
/// Design-rule checks and exports use placeholder collaborators that answer
/// `501 Not Implemented`; database regeneration indexes the configured parts
/// folder.
#[must_use]
pub fn default_handlers(config: &Config) -> ServiceHandlers {
    default_handlers_with_sink(config, Arc::new(TracingProgressSink))
}

/// Builds the shipped handler table with a custom progress sink.
#[must_use]
pub fn default_handlers_with_sink(config: &Config, sink: Arc<dyn ProgressSink>) -> ServiceHandlers {
    let mut handlers = ServiceHandlers::new().with(
        ServiceType::Drc,
        DrcService::new(UnavailableDrcEngine, config.input_dir()),
    );
    for format in EXPORT_SERVICES {
        handlers.insert(
            format,
            ExportService::new(
                format,
                UnavailableExporter,
                config.input_dir(),
                config.output_dir(),
            ),
        );
    }
    handlers.with(
        ServiceType::Database,
        DatabaseService::new(
            Arc::new(PartsIndexRegenerator),
            config.parts_dir(),
            config.database_path(),
            sink,
        ),
    )
}

/// Resolves command parameters naming a file or folder.
///
/// Blank parameters select `default`; relative paths are taken relative to
/// `base`.
pub(crate) fn resolve_input(params: &str, base: &Utf8Path, default: &Utf8Path) -> Utf8PathBuf {
    let trimmed = params.trim();
    if trimmed.is_empty() {
        return default.to_path_buf();
    }
    let path = Utf8Path::new(trimmed);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
