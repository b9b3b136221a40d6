//! Entry point for the `edad` daemon; exits with the runtime's status code.

use std::io::{self, Write};
use std::process::ExitCode;

use edad::RunOutcome;

fn main() -> ExitCode {
    match edad::run_service() {
        Ok(outcome) => {
            if let RunOutcome::Batch(result) = &outcome
                && write_stdout(result.body()).is_err()
            {
                return ExitCode::FAILURE;
            }
            ExitCode::from(outcome.exit_code())
        }
        Err(error) => {
            // Telemetry may not be installed when bootstrap itself failed.
            writeln!(io::stderr(), "edad: {error}").ok();
            ExitCode::from(error.exit_code())
        }
    }
}

fn write_stdout(body: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(body.as_bytes())?;
    stdout.flush()
}
