//! Shared doubles and fixtures for the crate-level suites.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use camino::Utf8Path;
use edad_config::{Config, ServiceEndpoint, ServiceType};
use ortho_config::OrthoError;

use crate::bootstrap::{BootstrapError, ConfigLoader};
use crate::dispatch::{DispatchCore, DispatchStats};
use crate::health::HealthReporter;
use crate::process::{ShutdownError, ShutdownSignal};
use crate::protocol::client::send_command;
use crate::protocol::{Command, CommandResult};
use crate::services::{
    DrcEngine, DrcIssue, DrcReport, DrcService, ServiceError, ServiceHandlers,
};
use crate::transport::{ConnectionWorker, ListenerHandle, ServiceListener};

pub(super) const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration bound to an ephemeral loopback port.
pub(super) fn test_config(service: ServiceType) -> Config {
    Config {
        service,
        host: String::from("127.0.0.1"),
        port: 0,
        log_filter: String::from("warn"),
        ..Config::default()
    }
}

/// Loads through every `ortho_config` layer with `args` as the command line.
pub(super) struct ArgsConfigLoader {
    args: Vec<OsString>,
}

impl ArgsConfigLoader {
    pub(super) fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl ConfigLoader for ArgsConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter(self.args.clone())
    }
}

/// Lifecycle events recorded by [`RecordingHealthReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    ServiceModeDisabled,
    ListenerReady(ServiceType),
    BatchCompleted { service: ServiceType, status: u16 },
    ShutdownStarted,
    ShutdownCompleted { commands: u64 },
}

#[derive(Debug, Default)]
pub(super) struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
    listener: Mutex<Option<SocketAddr>>,
}

impl RecordingHealthReporter {
    pub(super) fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Polls until the listener has reported its address.
    pub(super) fn wait_for_listener(&self, timeout: Duration) -> Option<SocketAddr> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(addr) = *self.listener.lock().expect("listener mutex poisoned") {
                return Some(addr);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        None
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn service_mode_disabled(&self) {
        self.record(HealthEvent::ServiceModeDisabled);
    }

    fn listener_ready(&self, service: ServiceType, addr: SocketAddr) {
        *self.listener.lock().expect("listener mutex poisoned") = Some(addr);
        self.record(HealthEvent::ListenerReady(service));
    }

    fn batch_completed(&self, service: ServiceType, result: &CommandResult) {
        self.record(HealthEvent::BatchCompleted {
            service,
            status: result.status_code(),
        });
    }

    fn shutdown_started(&self) {
        self.record(HealthEvent::ShutdownStarted);
    }

    fn shutdown_completed(&self, stats: &DispatchStats) {
        self.record(HealthEvent::ShutdownCompleted {
            commands: stats.commands,
        });
    }
}

/// Shutdown signal released by the test instead of the operating system.
pub(super) struct ManualShutdown {
    release: Mutex<Receiver<()>>,
}

impl ManualShutdown {
    pub(super) fn new() -> (Self, Sender<()>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                release: Mutex::new(receiver),
            },
            sender,
        )
    }
}

impl ShutdownSignal for ManualShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        self.release
            .lock()
            .expect("shutdown mutex poisoned")
            .recv()
            .ok();
        Ok(())
    }
}

/// Design-rule engine that flags sketches whose name mentions `overlap`.
///
/// Each check takes `delay` and the engine records the highest number of
/// checks it ever saw running at once.
#[derive(Debug, Clone, Default)]
pub(super) struct StubDrcEngine {
    delay: Duration,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl StubDrcEngine {
    pub(super) fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub(super) fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl DrcEngine for StubDrcEngine {
    fn check(&mut self, sketch: &Utf8Path) -> Result<DrcReport, ServiceError> {
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.running.fetch_sub(1, Ordering::SeqCst);

        if sketch.as_str().contains("overlap") {
            return Ok(DrcReport {
                issues: vec![DrcIssue {
                    part: String::from("R1"),
                    message: String::from("overlaps C1"),
                }],
            });
        }
        Ok(DrcReport::clean())
    }
}

pub(super) fn drc_handlers(engine: StubDrcEngine) -> ServiceHandlers {
    ServiceHandlers::new().with(ServiceType::Drc, DrcService::new(engine, "sketches"))
}

/// A dispatch core and a listener wired together on an ephemeral port.
pub(super) struct RunningService {
    core: DispatchCore,
    listener: ListenerHandle,
}

impl RunningService {
    pub(super) fn start(active: ServiceType, handlers: ServiceHandlers) -> Self {
        Self::start_with_timeout(active, handlers, Duration::from_secs(2))
    }

    pub(super) fn start_with_timeout(
        active: ServiceType,
        handlers: ServiceHandlers,
        read_timeout: Duration,
    ) -> Self {
        let core = DispatchCore::spawn(active, handlers).expect("spawn dispatch core");
        let worker = ConnectionWorker::new(core.dispatcher(), read_timeout);
        let listener = ServiceListener::bind(&ServiceEndpoint::loopback_ephemeral())
            .expect("bind listener")
            .start(Arc::new(worker))
            .expect("start listener");
        Self { core, listener }
    }

    pub(super) fn addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub(super) fn send(&self, name: &str, params: &str) -> CommandResult {
        send_to(self.addr(), name, params)
    }

    /// Raises the listener's stop flag without waiting for workers.
    pub(super) fn raise_stop(&self) {
        self.listener.stop();
    }

    pub(super) fn shutdown(self) -> DispatchStats {
        self.listener.stop();
        self.listener.join().expect("join listener");
        self.core.shutdown()
    }
}

/// Sends one well-formed command and decodes the reply.
pub(super) fn send_to(addr: SocketAddr, name: &str, params: &str) -> CommandResult {
    let command = Command::new(name, params).expect("valid command");
    send_command(addr, &command, CLIENT_TIMEOUT).expect("command exchange")
}

/// Writes `bytes` and returns everything the service sends back.
pub(super) fn exchange_raw(addr: SocketAddr, bytes: &[u8], close_write: bool) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream
        .set_read_timeout(Some(CLIENT_TIMEOUT))
        .expect("set read timeout");
    stream.write_all(bytes).expect("write request");
    if close_write {
        stream.shutdown(Shutdown::Write).expect("half-close");
    }
    let mut response = Vec::new();
    stream.read_to_end(&mut response).expect("read response");
    response
}
