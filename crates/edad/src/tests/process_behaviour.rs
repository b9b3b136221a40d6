//! Runner behaviour for batch runs, service mode and refusals.

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;
use edad_config::ServiceType;
use rstest::rstest;

use crate::bootstrap::{BootstrapError, StaticConfigLoader};
use crate::process::{RunError, RunOutcome, run_service_with};
use crate::protocol::{CommandResult, status};
use crate::services::{ServiceError, ServiceHandlers, default_handlers};

use super::support::{
    ArgsConfigLoader, HealthEvent, ManualShutdown, RecordingHealthReporter, StubDrcEngine, drc_handlers, send_to,
    test_config,
};

#[test]
fn disabled_service_mode_is_refused() {
    let loader = StaticConfigLoader::new(test_config(ServiceType::NoService));
    let reporter = RecordingHealthReporter::default();
    let (shutdown, _release) = ManualShutdown::new();
    let built = AtomicBool::new(false);

    let error = run_service_with(&loader, &reporter, &shutdown, |_| {
        built.store(true, Ordering::SeqCst);
        ServiceHandlers::new()
    })
    .expect_err("no service selected");

    assert!(matches!(error, RunError::ServiceModeDisabled));
    assert_ne!(error.exit_code(), 0);
    assert!(!built.load(Ordering::SeqCst));
    assert!(reporter.events().contains(&HealthEvent::ServiceModeDisabled));
}

#[test]
fn bare_command_line_loads_defaults_and_refuses_to_serve() {
    let loader = ArgsConfigLoader::new(["edad"]);
    let reporter = RecordingHealthReporter::default();
    let (shutdown, _release) = ManualShutdown::new();

    let error = run_service_with(&loader, &reporter, &shutdown, |_| ServiceHandlers::new())
        .expect_err("defaults select no service");

    assert!(matches!(error, RunError::ServiceModeDisabled), "{error}");
    assert_eq!(error.exit_code(), 3);
    let events = reporter.events();
    assert!(events.contains(&HealthEvent::BootstrapSucceeded));
    assert!(events.contains(&HealthEvent::ServiceModeDisabled));
}

#[test]
fn command_line_selects_the_batch_service() {
    let loader = ArgsConfigLoader::new(["edad", "--service", "drc", "--batch", "board.fzz"]);
    let reporter = RecordingHealthReporter::default();
    let (shutdown, _release) = ManualShutdown::new();

    let outcome = run_service_with(&loader, &reporter, &shutdown, |_| {
        drc_handlers(StubDrcEngine::default())
    })
    .expect("batch run");

    assert_eq!(outcome.exit_code(), 0);
    assert!(reporter.events().contains(&HealthEvent::BatchCompleted {
        service: ServiceType::Drc,
        status: status::OK,
    }));
}

#[test]
fn invalid_configuration_fails_bootstrap() {
    let mut config = test_config(ServiceType::Drc);
    config.read_timeout_ms = 0;
    let loader = StaticConfigLoader::new(config);
    let reporter = RecordingHealthReporter::default();
    let (shutdown, _release) = ManualShutdown::new();

    let error = run_service_with(&loader, &reporter, &shutdown, |_| ServiceHandlers::new())
        .expect_err("zero timeout rejected");

    assert!(matches!(
        error,
        RunError::Bootstrap(BootstrapError::Invalid { .. })
    ));
    assert!(matches!(
        reporter.events().last(),
        Some(HealthEvent::BootstrapFailed(_))
    ));
}

#[rstest]
#[case::passes("board.fzz", status::OK, 0)]
#[case::fails_checks("overlap.fzz", status::OK, 0)]
fn batch_runs_one_drc_command(
    #[case] params: &str,
    #[case] expected_status: u16,
    #[case] expected_exit: u8,
) {
    let mut config = test_config(ServiceType::Drc);
    config.batch = Some(params.to_owned());
    let loader = StaticConfigLoader::new(config);
    let reporter = RecordingHealthReporter::default();
    let (shutdown, _release) = ManualShutdown::new();

    let outcome = run_service_with(&loader, &reporter, &shutdown, |_| {
        drc_handlers(StubDrcEngine::default())
    })
    .expect("batch run");

    let RunOutcome::Batch(ref result) = outcome else {
        panic!("expected a batch outcome, got {outcome:?}");
    };
    assert_eq!(result.status_code(), expected_status);
    assert_eq!(outcome.exit_code(), expected_exit);
    assert!(reporter.events().contains(&HealthEvent::BatchCompleted {
        service: ServiceType::Drc,
        status: expected_status,
    }));
}

#[test]
fn failed_batch_command_exits_with_one() {
    let mut config = test_config(ServiceType::Gerber);
    config.batch = Some(String::from("board.fzz"));
    let loader = StaticConfigLoader::new(config);
    let reporter = RecordingHealthReporter::default();
    let (shutdown, _release) = ManualShutdown::new();

    let outcome = run_service_with(&loader, &reporter, &shutdown, |_| {
        ServiceHandlers::new().with(
            ServiceType::Gerber,
            |_: &str| -> Result<CommandResult, ServiceError> {
                Err(ServiceError::failed("plotter jammed"))
            },
        )
    })
    .expect("batch run");

    assert_eq!(outcome.exit_code(), 1);
}

#[test]
fn port_service_has_no_batch_command() {
    let mut config = test_config(ServiceType::Port);
    config.batch = Some(String::new());
    let loader = StaticConfigLoader::new(config);
    let reporter = RecordingHealthReporter::default();
    let (shutdown, _release) = ManualShutdown::new();

    let error = run_service_with(&loader, &reporter, &shutdown, |_| ServiceHandlers::new())
        .expect_err("port cannot batch");

    assert!(matches!(
        error,
        RunError::BatchUnsupported {
            service: ServiceType::Port
        }
    ));
}

#[test]
fn batch_database_regeneration_indexes_parts() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
    let parts = root.join("parts");
    fs::create_dir_all(parts.join("core")).expect("parts folder");
    fs::write(parts.join("core/resistor.fzp"), "<module/>").expect("write part");
    fs::write(parts.join("led.fzp"), "<module/>").expect("write part");
    fs::write(parts.join("notes.txt"), "ignored").expect("write note");

    let mut config = test_config(ServiceType::Database);
    config.parts_dir = parts;
    config.database_path = root.join("parts.db");
    config.batch = Some(String::new());
    let loader = StaticConfigLoader::new(config);
    let reporter = RecordingHealthReporter::default();
    let (shutdown, _release) = ManualShutdown::new();

    let outcome =
        run_service_with(&loader, &reporter, &shutdown, default_handlers).expect("batch run");

    let RunOutcome::Batch(ref result) = outcome else {
        panic!("expected a batch outcome, got {outcome:?}");
    };
    assert_eq!(result.status_code(), status::OK, "{}", result.body());
    assert!(result.body().starts_with("database: indexed 2 part(s)"));
    let index = fs::read_to_string(root.join("parts.db")).expect("read database");
    assert!(index.contains("core/resistor.fzp"));
    assert!(index.contains("led.fzp"));
    assert!(!root.join("parts.db.partial").exists());
}

#[test]
fn service_mode_serves_until_shutdown() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let (shutdown, release) = ManualShutdown::new();

    let runner = {
        let runner_reporter = Arc::clone(&reporter);
        thread::spawn(move || {
            let loader = StaticConfigLoader::new(test_config(ServiceType::Drc));
            run_service_with(&loader, &*runner_reporter, &shutdown, |_| {
                drc_handlers(StubDrcEngine::default())
            })
        })
    };

    let addr = reporter
        .wait_for_listener(Duration::from_secs(5))
        .expect("listener ready");
    assert_eq!(send_to(addr, "drc", "board.fzz").status_code(), status::OK);
    assert_eq!(
        send_to(addr, "export-all", "").status_code(),
        status::FORBIDDEN
    );
    release.send(()).expect("release shutdown");

    let outcome = runner
        .join()
        .expect("runner thread")
        .expect("service run");
    assert_eq!(outcome.exit_code(), 0);
    let RunOutcome::Served(stats) = outcome else {
        panic!("expected a served outcome, got {outcome:?}");
    };
    assert!(stats.commands >= 1);

    let events = reporter.events();
    assert!(events.contains(&HealthEvent::ListenerReady(ServiceType::Drc)));
    assert!(events.contains(&HealthEvent::ShutdownStarted));
    assert!(matches!(
        events.last(),
        Some(HealthEvent::ShutdownCompleted { .. })
    ));
}
