//! Process runner: selects batch or service mode and supervises shutdown.

mod errors;
mod run;
pub(crate) mod shutdown;

pub use self::errors::RunError;
pub use self::run::{RunOutcome, run_service, run_service_with};
pub use self::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
