//! Tests for single-flight dispatch.

use std::sync::{Arc, Barrier, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use edad_config::ServiceType;
use rstest::{fixture, rstest};

use super::*;
use crate::protocol::{Command, CommandResult, status};
use crate::services::{MockServiceHandler, ServiceError, ServiceHandlers};

type Intervals = Arc<Mutex<Vec<(Instant, Instant)>>>;

fn command(line: &str) -> Command {
    let (name, params) = line.split_once(' ').unwrap_or((line, ""));
    Command::new(name, params).expect("valid command")
}

fn echo(params: &str) -> Result<CommandResult, ServiceError> {
    Ok(CommandResult::ok(format!("echo {params}\n")))
}

fn timed_handler(
    intervals: Intervals,
    hold: Duration,
) -> impl FnMut(&str) -> Result<CommandResult, ServiceError> + Send {
    move |_params: &str| {
        let started = Instant::now();
        thread::sleep(hold);
        intervals
            .lock()
            .expect("intervals lock")
            .push((started, Instant::now()));
        Ok(CommandResult::ok("done\n"))
    }
}

#[fixture]
fn port_core() -> DispatchCore {
    let handlers = ServiceHandlers::new()
        .with(ServiceType::Drc, echo)
        .with(ServiceType::Svg, |_: &str| -> Result<CommandResult, ServiceError> {
            Err(ServiceError::failed("renderer crashed"))
        })
        .with(ServiceType::Gerber, |_: &str| -> Result<CommandResult, ServiceError> {
            panic!("gerber engine exploded")
        });
    DispatchCore::spawn(ServiceType::Port, handlers).expect("spawn core")
}

#[rstest]
fn runs_enabled_commands(port_core: DispatchCore) {
    let result = port_core.dispatcher().execute(command("drc check"));
    assert_eq!(result.status_code(), status::OK);
    assert_eq!(result.body(), "echo check\n");
    port_core.shutdown();
}

#[rstest]
#[case("unknown foo", status::NOT_FOUND)]
#[case("svg", status::INTERNAL_SERVER_ERROR)]
#[case("geda", status::NOT_IMPLEMENTED)]
fn maps_failures_to_status(port_core: DispatchCore, #[case] line: &str, #[case] expected: u16) {
    let result = port_core.dispatcher().execute(command(line));
    assert_eq!(result.status_code(), expected);
    port_core.shutdown();
}

#[test]
fn rejects_commands_of_other_services() {
    let core = DispatchCore::spawn(
        ServiceType::Drc,
        ServiceHandlers::new()
            .with(ServiceType::Drc, echo)
            .with(ServiceType::Gerber, echo),
    )
    .expect("spawn core");

    let result = core.dispatcher().execute(command("gerber board.fzz"));
    assert_eq!(result.status_code(), status::FORBIDDEN);
    assert_eq!(
        core.dispatcher().execute(command("DRC x")).status_code(),
        status::OK
    );
    core.shutdown();
}

#[rstest]
fn survives_handler_panics(port_core: DispatchCore) {
    let dispatcher = port_core.dispatcher();

    let panicked = dispatcher.execute(command("gerber board.fzz"));
    assert_eq!(panicked.status_code(), status::INTERNAL_SERVER_ERROR);
    assert!(panicked.body().contains("gerber engine exploded"));

    let next = dispatcher.execute(command("drc again"));
    assert_eq!(next.status_code(), status::OK);

    let stats = port_core.shutdown();
    assert_eq!(stats.commands, 2);
    assert_eq!(stats.failures, 1);
}

#[test]
fn handlers_receive_raw_params() {
    let mut mock = MockServiceHandler::new();
    mock.expect_handle()
        .withf(|params| params == "  spaced  params")
        .times(1)
        .returning(|_| Ok(CommandResult::ok("ok\n")));
    let core = DispatchCore::spawn(
        ServiceType::ExportAll,
        ServiceHandlers::new().with(ServiceType::ExportAll, mock),
    )
    .expect("spawn core");

    let result = core
        .dispatcher()
        .execute(Command::new("export-all", "  spaced  params").expect("valid command"));
    assert_eq!(result.status_code(), status::OK);
    core.shutdown();
}

#[test]
fn execution_intervals_never_overlap() {
    let intervals: Intervals = Arc::default();
    let hold = Duration::from_millis(30);
    let core = DispatchCore::spawn(
        ServiceType::Drc,
        ServiceHandlers::new().with(ServiceType::Drc, timed_handler(Arc::clone(&intervals), hold)),
    )
    .expect("spawn core");

    let clients = 4;
    let barrier = Arc::new(Barrier::new(clients));
    let workers: Vec<_> = (0..clients)
        .map(|index| {
            let dispatcher = core.dispatcher();
            let start_gate = Arc::clone(&barrier);
            thread::spawn(move || {
                start_gate.wait();
                dispatcher.execute(command(&format!("drc sketch{index}.fzz")))
            })
        })
        .collect();
    for worker in workers {
        let result = worker.join().expect("client thread");
        assert_eq!(result.status_code(), status::OK);
    }

    let mut recorded = intervals.lock().expect("intervals lock").clone();
    recorded.sort_by_key(|(start, _)| *start);
    assert_eq!(recorded.len(), clients);
    for pair in recorded.windows(2) {
        if let [(_, first_end), (second_start, _)] = pair {
            assert!(first_end <= second_start, "executions overlapped");
        }
    }

    let stats = core.shutdown();
    let handler_time: Duration = recorded.iter().map(|(start, end)| *end - *start).sum();
    assert!(stats.busy >= handler_time);
    assert_eq!(stats.commands, 4);
}

#[test]
fn commands_after_shutdown_are_unavailable() {
    let core = DispatchCore::spawn(
        ServiceType::Drc,
        ServiceHandlers::new().with(ServiceType::Drc, echo),
    )
    .expect("spawn core");
    let dispatcher = core.dispatcher();
    assert!(!dispatcher.is_closed());

    core.shutdown();

    assert!(dispatcher.is_closed());
    let result = dispatcher.execute(command("drc late"));
    assert_eq!(result.status_code(), status::SERVICE_UNAVAILABLE);
}

#[test]
fn in_flight_command_finishes_before_shutdown() {
    let (started_tx, started_rx) = mpsc::channel();
    let slow = move |_: &str| -> Result<CommandResult, ServiceError> {
        started_tx.send(()).expect("signal start");
        thread::sleep(Duration::from_millis(50));
        Ok(CommandResult::ok("slow\n"))
    };
    let core = DispatchCore::spawn(
        ServiceType::Drc,
        ServiceHandlers::new().with(ServiceType::Drc, slow),
    )
    .expect("spawn core");
    let dispatcher = core.dispatcher();
    let in_flight = thread::spawn(move || dispatcher.execute(command("drc slow")));

    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("command started");
    let stats = core.shutdown();

    let result = in_flight.join().expect("client thread");
    assert_eq!(result.status_code(), status::OK);
    assert_eq!(result.body(), "slow\n");
    assert_eq!(stats.commands, 1);
}
