//! Executor thread and the handles used to reach it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use edad_config::ServiceType;
use tracing::{debug, info, warn};

use super::{DISPATCH_TARGET, DispatchError};
use crate::protocol::{Command, CommandResult};
use crate::registry::ServiceRegistry;
use crate::services::ServiceHandlers;
use crate::task::panic_message;

const QUEUE_DEPTH: usize = 64;

enum Message {
    Run(Job),
    Stop,
}

struct Job {
    command: Command,
    reply: mpsc::Sender<CommandResult>,
}

/// Snapshot of executor counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Commands taken by the executor.
    pub commands: u64,
    /// Commands that produced a non-2xx result.
    pub failures: u64,
    /// Total time the executor spent running commands.
    pub busy: Duration,
}

#[derive(Debug, Default)]
struct Counters {
    commands: AtomicU64,
    failures: AtomicU64,
    busy_nanos: AtomicU64,
}

impl Counters {
    fn record(&self, elapsed: Duration, success: bool) {
        self.commands.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.busy_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            commands: self.commands.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            busy: Duration::from_nanos(self.busy_nanos.load(Ordering::Relaxed)),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    closed: AtomicBool,
    counters: Counters,
}

/// Cloneable handle used to submit commands to the executor.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    sender: SyncSender<Message>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Run(job) => write!(formatter, "Run({})", job.command),
            Self::Stop => formatter.write_str("Stop"),
        }
    }
}

impl Dispatcher {
    /// Runs `command` and blocks until its result is available.
    ///
    /// Calls from many threads are serialized by the executor. Once the core
    /// is shutting down, or if the executor is gone, the result is
    /// `503 Service Unavailable`.
    #[must_use]
    pub fn execute(&self, command: Command) -> CommandResult {
        if self.is_closed() {
            return DispatchError::Unavailable.to_command_result();
        }
        let (reply, result) = mpsc::channel();
        if self.sender.send(Message::Run(Job { command, reply })).is_err() {
            return DispatchError::Unavailable.to_command_result();
        }
        result
            .recv()
            .unwrap_or_else(|_| DispatchError::Unavailable.to_command_result())
    }

    /// Returns true once shutdown has started.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Current executor counters.
    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        self.shared.counters.snapshot()
    }
}

/// Owner of the executor thread.
#[derive(Debug)]
pub struct DispatchCore {
    dispatcher: Dispatcher,
    executor: Option<JoinHandle<()>>,
}

impl DispatchCore {
    /// Starts the executor for the `active` service with `handlers`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Spawn`] when the executor thread cannot be
    /// started.
    pub fn spawn(active: ServiceType, handlers: ServiceHandlers) -> Result<Self, DispatchError> {
        let (sender, receiver) = mpsc::sync_channel(QUEUE_DEPTH);
        let shared = Arc::new(Shared::default());
        let executor_shared = Arc::clone(&shared);
        let registry = ServiceRegistry::new(active);
        let executor = thread::Builder::new()
            .name(String::from("edad-dispatch"))
            .spawn(move || run_executor(&receiver, registry, handlers, &executor_shared))
            .map_err(DispatchError::Spawn)?;
        info!(target: DISPATCH_TARGET, service = %active, "dispatch executor started");

        Ok(Self {
            dispatcher: Dispatcher { sender, shared },
            executor: Some(executor),
        })
    }

    /// Returns a handle for submitting commands.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Current executor counters.
    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Stops admitting commands, lets queued commands finish, and joins the
    /// executor.
    ///
    /// Commands submitted after this call starts are answered with
    /// `503 Service Unavailable`.
    #[must_use]
    pub fn shutdown(mut self) -> DispatchStats {
        self.close();
        if let Some(executor) = self.executor.take() {
            if self.dispatcher.sender.send(Message::Stop).is_err() {
                debug!(target: DISPATCH_TARGET, "dispatch executor already stopped");
            }
            if executor.join().is_err() {
                warn!(target: DISPATCH_TARGET, "dispatch executor panicked");
            }
        }
        let stats = self.stats();
        info!(
            target: DISPATCH_TARGET,
            commands = stats.commands,
            failures = stats.failures,
            busy_ms = stats.busy.as_millis(),
            "dispatch executor stopped"
        );
        stats
    }

    fn close(&self) {
        self.dispatcher.shared.closed.store(true, Ordering::Release);
    }
}

impl Drop for DispatchCore {
    fn drop(&mut self) {
        if self.executor.is_some() {
            self.close();
            match self.dispatcher.sender.try_send(Message::Stop) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(target: DISPATCH_TARGET, "dispatch queue full while dropping core");
                }
            }
        }
    }
}

fn run_executor(
    receiver: &Receiver<Message>,
    registry: ServiceRegistry,
    mut handlers: ServiceHandlers,
    shared: &Shared,
) {
    for message in receiver {
        match message {
            Message::Stop => break,
            Message::Run(job) => {
                let started = Instant::now();
                let result = execute_job(&registry, &mut handlers, &job.command);
                let elapsed = started.elapsed();
                shared.counters.record(elapsed, result.is_success());
                info!(
                    target: DISPATCH_TARGET,
                    command = job.command.name(),
                    status = result.status_code(),
                    elapsed_ms = elapsed.as_millis(),
                    "command finished"
                );
                if job.reply.send(result).is_err() {
                    debug!(
                        target: DISPATCH_TARGET,
                        command = job.command.name(),
                        "requester left before the result was delivered"
                    );
                }
            }
        }
    }
    debug!(target: DISPATCH_TARGET, "dispatch executor loop exited");
}

fn execute_job(
    registry: &ServiceRegistry,
    handlers: &mut ServiceHandlers,
    command: &Command,
) -> CommandResult {
    debug!(
        target: DISPATCH_TARGET,
        command = command.name(),
        params = command.params(),
        "executing command"
    );
    let outcome = registry
        .resolve(command.name())
        .and_then(|service| invoke(handlers, service, command.params()));
    match outcome {
        Ok(result) => result,
        Err(error) => {
            if error.status_code() >= 500 {
                warn!(target: DISPATCH_TARGET, command = command.name(), error = %error, "command failed");
            } else {
                debug!(target: DISPATCH_TARGET, command = command.name(), error = %error, "command rejected");
            }
            error.to_command_result()
        }
    }
}

fn invoke(
    handlers: &mut ServiceHandlers,
    service: ServiceType,
    params: &str,
) -> Result<CommandResult, DispatchError> {
    let handler = handlers
        .get_mut(service)
        .ok_or(DispatchError::MissingHandler { service })?;
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(params))) {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(source)) => Err(DispatchError::Service { service, source }),
        Err(payload) => Err(DispatchError::HandlerPanicked {
            service,
            message: panic_message(payload.as_ref()),
        }),
    }
}
