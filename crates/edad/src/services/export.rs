//! File-format export services.

use camino::{Utf8Path, Utf8PathBuf};
use edad_config::ServiceType;
use tracing::debug;

use super::{SERVICES_TARGET, ServiceError, ServiceHandler, resolve_input};
use crate::protocol::CommandResult;

/// Writes one export format for an input sketch or folder.
#[cfg_attr(test, mockall::automock)]
pub trait Exporter: Send {
    /// Exports `input` in `format` into `output_dir`, returning the files
    /// written.
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] when the export cannot be produced.
    fn export(
        &mut self,
        format: ServiceType,
        input: &Utf8Path,
        output_dir: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, ServiceError>;
}

/// Handler for the export commands (`gerber`, `svg`, `export-all`, ...).
///
/// Parameters name the input relative to the input folder; blank parameters
/// export the whole input folder.
#[derive(Debug)]
pub struct ExportService<X> {
    format: ServiceType,
    exporter: X,
    input_dir: Utf8PathBuf,
    output_dir: Utf8PathBuf,
}

impl<X: Exporter> ExportService<X> {
    /// Creates the handler for `format`.
    #[must_use]
    pub fn new(
        format: ServiceType,
        exporter: X,
        input_dir: impl Into<Utf8PathBuf>,
        output_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            format,
            exporter,
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
        }
    }
}

impl<X: Exporter> ServiceHandler for ExportService<X> {
    fn handle(&mut self, params: &str) -> Result<CommandResult, ServiceError> {
        let input = resolve_input(params, &self.input_dir, &self.input_dir);
        debug!(
            target: SERVICES_TARGET,
            format = %self.format,
            input = %input,
            output = %self.output_dir,
            "running export"
        );
        let written = self
            .exporter
            .export(self.format, &input, &self.output_dir)?;

        if written.is_empty() {
            return Ok(CommandResult::ok(format!(
                "{}: nothing to export from {input}\n",
                self.format
            )));
        }
        let header = format!(
            "{}: wrote {} file(s) to {}\n",
            self.format,
            written.len(),
            self.output_dir
        );
        let body = written
            .iter()
            .fold(header, |body, file| body + file.as_str() + "\n");
        Ok(CommandResult::ok(body))
    }
}
