//! TCP command listener and per-connection workers.
//!
//! The listener accepts connections on a background thread and hands each
//! one to a [`ConnectionHandler`] on its own thread, so a slow command never
//! blocks the accept loop. [`ConnectionWorker`] is the handler used by the
//! daemon: it reads one request line, runs it through the dispatch core, and
//! writes one response.

mod errors;
mod listener;
#[cfg(test)]
mod test_utils;
mod worker;

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub use self::errors::ListenerError;
pub use self::listener::{ListenerHandle, ServiceListener};
pub use self::worker::{ConnectionWorker, MAX_REQUEST_BYTES};

pub(crate) use self::errors::FrameError;
#[cfg(test)]
pub(crate) use self::test_utils::CountingHandler;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Shared flag raised when the listener stops.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Creates a lowered flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag; it never lowers again.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once the flag has been raised.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An accepted connection, owned exclusively by the thread handling it.
#[derive(Debug)]
pub struct Connection {
    /// Socket to the client.
    pub stream: TcpStream,
    /// Client address.
    pub peer: SocketAddr,
    /// Raised when the listener stops.
    pub stop: StopSignal,
}

/// Handles accepted connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, connection: Connection);
}
