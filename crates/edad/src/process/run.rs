//! Supervises batch runs and the long-lived command service.

use std::sync::Arc;

use edad_config::{Config, ServiceType};
use tracing::info;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::dispatch::{DispatchCore, DispatchStats};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::protocol::{Command, CommandResult};
use crate::registry::command_name;
use crate::services::{ServiceHandlers, default_handlers};
use crate::transport::{ConnectionWorker, ServiceListener};

use super::PROCESS_TARGET;
use super::errors::RunError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// How a successful run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The listener served until a shutdown signal arrived.
    Served(DispatchStats),
    /// A single batch command ran to completion.
    Batch(CommandResult),
}

impl RunOutcome {
    /// Exit code for the process: 0, or 1 for a batch command that did not
    /// return a 2xx status.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Batch(result) if !result.is_success() => 1,
            Self::Served(_) | Self::Batch(_) => 0,
        }
    }
}

/// Runs the service using configuration from the process environment.
///
/// # Errors
///
/// Returns [`RunError`] when bootstrap fails, no service is selected, or the
/// listener cannot be started.
pub fn run_service() -> Result<RunOutcome, RunError> {
    let reporter = StructuredHealthReporter::new();
    run_service_with(
        &SystemConfigLoader,
        &reporter,
        &SystemShutdownSignal::new(),
        default_handlers,
    )
}

/// Runs the service with injected collaborators.
///
/// `handlers` builds the service handlers from the resolved configuration;
/// it is only called once a service has been selected.
///
/// # Errors
///
/// See [`run_service`].
pub fn run_service_with<H>(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
    shutdown: &dyn ShutdownSignal,
    handlers: H,
) -> Result<RunOutcome, RunError>
where
    H: FnOnce(&Config) -> ServiceHandlers,
{
    let config = bootstrap_with(loader, reporter)?.into_config();
    let service = config.service();
    if !service.is_service_mode() {
        reporter.service_mode_disabled();
        return Err(RunError::ServiceModeDisabled);
    }

    info!(
        target: PROCESS_TARGET,
        service = %service,
        long_running = service.is_long_running(),
        batch = config.batch().is_some(),
        "starting service runtime"
    );
    let core = DispatchCore::spawn(service, handlers(&config))?;
    match config.batch() {
        Some(params) => run_batch(core, service, params, reporter),
        None => serve(core, &config, reporter, shutdown),
    }
}

fn run_batch(
    core: DispatchCore,
    service: ServiceType,
    params: &str,
    reporter: &dyn HealthReporter,
) -> Result<RunOutcome, RunError> {
    let name = command_name(service).ok_or(RunError::BatchUnsupported { service })?;
    let command = Command::new(name, params).map_err(RunError::BatchParams)?;
    let result = core.dispatcher().execute(command);
    reporter.batch_completed(service, &result);
    core.shutdown();
    Ok(RunOutcome::Batch(result))
}

fn serve(
    core: DispatchCore,
    config: &Config,
    reporter: &dyn HealthReporter,
    shutdown: &dyn ShutdownSignal,
) -> Result<RunOutcome, RunError> {
    let listener = ServiceListener::bind(&config.endpoint())?;
    let worker = ConnectionWorker::new(core.dispatcher(), config.read_timeout());
    let handle = listener.start(Arc::new(worker))?;
    reporter.listener_ready(config.service(), handle.local_addr());

    let waited = shutdown.wait();
    reporter.shutdown_started();
    handle.stop();
    let joined = handle.join();
    let stats = core.shutdown();
    reporter.shutdown_completed(&stats);
    waited?;
    joined?;
    Ok(RunOutcome::Served(stats))
}
