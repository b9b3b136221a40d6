//! Design-rule checking.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use super::{SERVICES_TARGET, ServiceError, ServiceHandler, resolve_input};
use crate::protocol::CommandResult;

/// One overlap found by the checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrcIssue {
    /// Part label as shown in the sketch.
    pub part: String,
    /// What the part overlaps.
    pub message: String,
}

/// Outcome of checking one sketch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrcReport {
    /// Overlapping parts; empty when the sketch passes.
    pub issues: Vec<DrcIssue>,
}

impl DrcReport {
    /// Report for a sketch without issues.
    #[must_use]
    pub const fn clean() -> Self {
        Self { issues: Vec::new() }
    }

    /// Returns true when no issue was found.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Checks a sketch for overlapping parts.
#[cfg_attr(test, mockall::automock)]
pub trait DrcEngine: Send {
    /// Checks the sketch at `sketch`.
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] when the sketch cannot be checked.
    fn check(&mut self, sketch: &Utf8Path) -> Result<DrcReport, ServiceError>;
}

/// Handler for the `drc` command.
///
/// Parameters name a sketch relative to the input folder; blank parameters
/// check the input folder itself.
#[derive(Debug)]
pub struct DrcService<E> {
    engine: E,
    input_dir: Utf8PathBuf,
}

impl<E: DrcEngine> DrcService<E> {
    /// Creates the handler.
    #[must_use]
    pub fn new(engine: E, input_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            engine,
            input_dir: input_dir.into(),
        }
    }
}

impl<E: DrcEngine> ServiceHandler for DrcService<E> {
    fn handle(&mut self, params: &str) -> Result<CommandResult, ServiceError> {
        let sketch = resolve_input(params, &self.input_dir, &self.input_dir);
        debug!(target: SERVICES_TARGET, sketch = %sketch, "running design-rule check");
        let report = self.engine.check(&sketch)?;
        Ok(CommandResult::ok(summarise(&sketch, &report)))
    }
}

fn summarise(sketch: &Utf8Path, report: &DrcReport) -> String {
    let label = sketch.file_name().unwrap_or(sketch.as_str());
    if report.passed() {
        return format!("DRC passed: {label} has no overlapping parts\n");
    }
    let header = format!(
        "DRC failed: {} overlapping part(s) in {label}\n",
        report.issues.len()
    );
    report
        .issues
        .iter()
        .map(|issue| format!("- {}: {}\n", issue.part, issue.message))
        .fold(header, |body, line| body + &line)
}
