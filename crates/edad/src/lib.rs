//! Headless command service for an EDA application.
//!
//! A process runs at most one long-running service (design rule check, one
//! of the export formats, or the parts database regeneration) or a single
//! batch command. In service mode a TCP listener accepts one-line commands,
//! each connection gets its own worker, and every command passes through the
//! [`dispatch::DispatchCore`], which runs one command at a time on a single
//! executor thread.
//!
//! Requests are UTF-8 lines of the form `<command> <params>\n`; responses
//! carry a status line, a MIME type and a body (see [`protocol`]). Commands
//! for services other than the active one are refused unless the process runs
//! the `port` service, which accepts them all.
//!
//! Long operations run as [`task::BackgroundTask`]s that report progress and
//! honour cancellation, and they write their outputs through
//! [`task::StagedFile`] so readers never observe partial files.

mod bootstrap;
pub mod dispatch;
mod health;
mod process;
pub mod protocol;
pub mod registry;
pub mod services;
pub mod task;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    RunError, RunOutcome, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_service,
    run_service_with,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
