//! Listener implementation for the command port.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use edad_config::ServiceEndpoint;
use tracing::{info, warn};

use super::{Connection, ConnectionHandler, LISTENER_TARGET, ListenerError, StopSignal};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to the command endpoint but not yet accepting.
#[derive(Debug)]
pub struct ServiceListener {
    endpoint: ServiceEndpoint,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl ServiceListener {
    /// Resolves and binds `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Resolve`] or [`ListenerError::ResolveEmpty`]
    /// when the host does not resolve, and [`ListenerError::BindTcp`] when the
    /// address is in use or not permitted.
    pub fn bind(endpoint: &ServiceEndpoint) -> Result<Self, ListenerError> {
        let listener = bind_tcp(&endpoint.host, endpoint.port)?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::LocalAddr { source })?;
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
            local_addr,
        })
    }

    /// Address actually bound; reports the chosen port for ephemeral binds.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts the accept loop on a background thread.
    ///
    /// Every accepted connection is handed to `handler` on a new thread.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::NonBlocking`] when the socket cannot be
    /// switched to non-blocking mode and [`ListenerError::Spawn`] when the
    /// accept thread cannot be started.
    pub fn start(self, handler: Arc<dyn ConnectionHandler>) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let stop = StopSignal::new();
        let loop_stop = stop.clone();
        let local_addr = self.local_addr;
        let accept = thread::Builder::new()
            .name(String::from("edad-accept"))
            .spawn(move || run_accept_loop(&self, &loop_stop, &handler))
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            stop,
            local_addr,
            accept: Some(accept),
        })
    }
}

/// Handle to the background accept loop and its connection workers.
#[derive(Debug)]
pub struct ListenerHandle {
    stop: StopSignal,
    local_addr: SocketAddr,
    accept: Option<JoinHandle<Vec<JoinHandle<()>>>>,
}

impl ListenerHandle {
    /// Address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting and raises the stop flag seen by in-flight workers.
    ///
    /// The socket closes once the accept loop notices the flag.
    pub fn stop(&self) {
        self.stop.raise();
    }

    /// Returns true once [`ListenerHandle::stop`] has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_raised()
    }

    /// Waits for the accept loop and every in-flight worker to finish.
    ///
    /// Call [`ListenerHandle::stop`] first; otherwise this blocks until the
    /// flag is raised elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] when the accept loop panicked
    /// and [`ListenerError::WorkerPanic`] when any worker panicked.
    pub fn join(mut self) -> Result<(), ListenerError> {
        let Some(accept) = self.accept.take() else {
            return Ok(());
        };
        let workers = accept.join().map_err(|_| ListenerError::ThreadPanic)?;
        let panicked = join_workers(workers);
        if panicked == 0 {
            Ok(())
        } else {
            Err(ListenerError::WorkerPanic { count: panicked })
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop.raise();
    }
}

fn run_accept_loop(
    listener: &ServiceListener,
    stop: &StopSignal,
    handler: &Arc<dyn ConnectionHandler>,
) -> Vec<JoinHandle<()>> {
    info!(
        target: LISTENER_TARGET,
        endpoint = %listener.endpoint,
        addr = %listener.local_addr,
        "command listener active"
    );
    let mut workers: Vec<JoinHandle<()>> = Vec::new();
    let mut last_error = None::<io::ErrorKind>;
    while !stop.is_raised() {
        match accept_connection(&listener.listener) {
            Ok(Some((stream, peer))) => {
                last_error = None;
                reap_finished(&mut workers);
                let connection = Connection {
                    stream,
                    peer,
                    stop: stop.clone(),
                };
                let worker_handler = Arc::clone(handler);
                match thread::Builder::new()
                    .name(format!("edad-conn-{peer}"))
                    .spawn(move || worker_handler.handle(connection))
                {
                    Ok(worker) => workers.push(worker),
                    Err(error) => warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        peer = %peer,
                        "failed to start connection worker"
                    ),
                }
            }
            Ok(None) => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    info!(
        target: LISTENER_TARGET,
        in_flight = workers.len(),
        "command listener stopped accepting"
    );
    workers
}

fn accept_connection(listener: &TcpListener) -> Result<Option<(TcpStream, SocketAddr)>, io::Error> {
    match listener.accept() {
        Ok((stream, peer)) => {
            stream.set_nonblocking(false)?;
            Ok(Some((stream, peer)))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn reap_finished(workers: &mut Vec<JoinHandle<()>>) {
    let (finished, running): (Vec<_>, Vec<_>) =
        workers.drain(..).partition(JoinHandle::is_finished);
    *workers = running;
    let panicked = join_workers(finished);
    if panicked > 0 {
        warn!(target: LISTENER_TARGET, panicked, "connection worker panicked");
    }
}

fn join_workers(workers: Vec<JoinHandle<()>>) -> usize {
    let mut panicked = 0;
    for worker in workers {
        if worker.join().is_err() {
            panicked += 1;
        }
    }
    panicked
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs.next().ok_or_else(|| ListenerError::ResolveEmpty {
        host: host.to_owned(),
        port,
    })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })
}
