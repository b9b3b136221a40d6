//! Single-flight command execution.
//!
//! [`DispatchCore`] owns every service handler on one executor thread.
//! Connection workers hold cloneable [`Dispatcher`] handles and submit
//! commands over a bounded channel, each with its own reply channel. The
//! executor takes one request at a time, so at most one command runs
//! application logic at any instant and the order of admission is the order
//! in which requests reach the channel.
//!
//! Errors and panics raised by handlers are converted into error results at
//! this boundary; the executor keeps serving afterwards.

mod errors;
mod executor;
#[cfg(test)]
mod tests;

pub use self::errors::DispatchError;
pub use self::executor::{DispatchCore, DispatchStats, Dispatcher};

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
