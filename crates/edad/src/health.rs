//! Structured health reporting for daemon lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use edad_config::{Config, ServiceType};

use crate::bootstrap::BootstrapError;
use crate::dispatch::DispatchStats;
use crate::protocol::CommandResult;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked when the process is not in service mode.
    fn service_mode_disabled(&self);

    /// Invoked once the command listener accepts connections.
    fn listener_ready(&self, service: ServiceType, addr: SocketAddr);

    /// Invoked after a one-shot batch command completes.
    fn batch_completed(&self, service: ServiceType, result: &CommandResult);

    /// Invoked when shutdown begins.
    fn shutdown_started(&self);

    /// Invoked after the listener and dispatch core have stopped.
    fn shutdown_completed(&self, stats: &DispatchStats);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn service_mode_disabled(&self) {
        (**self).service_mode_disabled();
    }

    fn listener_ready(&self, service: ServiceType, addr: SocketAddr) {
        (**self).listener_ready(service, addr);
    }

    fn batch_completed(&self, service: ServiceType, result: &CommandResult) {
        (**self).batch_completed(service, result);
    }

    fn shutdown_started(&self) {
        (**self).shutdown_started();
    }

    fn shutdown_completed(&self, stats: &DispatchStats) {
        (**self).shutdown_completed(stats);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting service bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            service = %config.service(),
            endpoint = %config.endpoint(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "service bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "service bootstrap failed"
        );
    }

    fn service_mode_disabled(&self) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "service_mode_disabled",
            "no service selected; command listener not started"
        );
    }

    fn listener_ready(&self, service: ServiceType, addr: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listener_ready",
            service = %service,
            addr = %addr,
            "command listener ready"
        );
    }

    fn batch_completed(&self, service: ServiceType, result: &CommandResult) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "batch_completed",
            service = %service,
            status = result.status_code(),
            "batch command completed"
        );
    }

    fn shutdown_started(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_started",
            "stopping command listener"
        );
    }

    fn shutdown_completed(&self, stats: &DispatchStats) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_completed",
            commands = stats.commands,
            failures = stats.failures,
            busy_ms = stats.busy.as_millis(),
            "shutdown sequence completed"
        );
    }
}
