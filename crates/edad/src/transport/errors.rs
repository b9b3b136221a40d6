//! Error types for listener and connection operations.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced while binding or running the command listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured host did not resolve.
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// The host resolved to no addresses.
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
    },
    /// Binding failed, usually because the port is taken.
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The bound socket could not report its address.
    #[error("failed to read the bound listener address: {source}")]
    LocalAddr {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The socket could not be switched to non-blocking mode.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept thread could not be started.
    #[error("failed to start listener thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept loop panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
    /// One or more connection workers panicked.
    #[error("{count} connection worker(s) panicked")]
    WorkerPanic {
        /// Number of workers that panicked.
        count: usize,
    },
}

/// Reasons a connection closes before a complete request line arrives.
///
/// None of these produce a response; the connection is closed silently.
#[derive(Debug, Error)]
pub(crate) enum FrameError {
    #[error("no complete request line within the read deadline")]
    TimedOut,
    #[error("peer closed the connection after {received} byte(s) without a newline")]
    Closed { received: usize },
    #[error("request line exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("failed to read request: {0}")]
    Io(#[from] io::Error),
}
