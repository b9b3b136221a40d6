//! Parts database regeneration, run as a background task.

use std::io::Write as _;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use super::{SERVICES_TARGET, ServiceError, ServiceHandler, resolve_input};
use crate::protocol::CommandResult;
use crate::task::{BackgroundTask, ProgressSink, StagedFile, TaskContext, TaskError};

const PART_EXTENSION: &str = "fzp";
const MANIFEST_HEADER: &str = "# edad parts index";

/// Result of a successful regeneration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSummary {
    /// Number of part definitions recorded.
    pub parts: usize,
    /// Database file that was written.
    pub database: Utf8PathBuf,
}

/// Rebuilds the parts database from a folder of part definitions.
///
/// Implementations run on a background task thread and should call
/// [`TaskContext::checkpoint`] between units of work so cancellation is
/// honoured.
pub trait DatabaseRegenerator: Send + Sync {
    /// Regenerates `database` from the parts under `parts_dir`.
    ///
    /// # Errors
    ///
    /// Returns a [`TaskError`] when the folder cannot be read, the output
    /// cannot be written, or the task is cancelled.
    fn regenerate(
        &self,
        parts_dir: &Utf8Path,
        database: &Utf8Path,
        context: &TaskContext<'_>,
    ) -> Result<DatabaseSummary, TaskError>;
}

/// Indexes every `.fzp` file under the parts folder into a manifest.
///
/// The manifest lists one path per line, relative to the parts folder and
/// sorted, after a header line. It is written through [`StagedFile`], so an
/// interrupted run leaves any previous database untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PartsIndexRegenerator;

impl DatabaseRegenerator for PartsIndexRegenerator {
    fn regenerate(
        &self,
        parts_dir: &Utf8Path,
        database: &Utf8Path,
        context: &TaskContext<'_>,
    ) -> Result<DatabaseSummary, TaskError> {
        let parts = collect_parts(parts_dir, context)?;
        let total = u64::try_from(parts.len()).unwrap_or(u64::MAX);
        context.report(0, Some(total));

        let mut output =
            StagedFile::create(database).map_err(|error| TaskError::io(database.as_str(), &error))?;
        let write_error = |error: std::io::Error| TaskError::io(database.as_str(), &error);
        writeln!(output, "{MANIFEST_HEADER}").map_err(write_error)?;
        for (index, part) in parts.iter().enumerate() {
            context.checkpoint()?;
            writeln!(output, "{part}").map_err(write_error)?;
            context.report(u64::try_from(index + 1).unwrap_or(u64::MAX), Some(total));
        }
        context.checkpoint()?;
        let written = output.commit().map_err(write_error)?;

        Ok(DatabaseSummary {
            parts: parts.len(),
            database: written,
        })
    }
}

fn collect_parts(parts_dir: &Utf8Path, context: &TaskContext<'_>) -> Result<Vec<String>, TaskError> {
    let mut pending = vec![parts_dir.to_path_buf()];
    let mut parts = Vec::new();
    while let Some(dir) = pending.pop() {
        context.checkpoint()?;
        let entries = dir
            .read_dir_utf8()
            .map_err(|error| TaskError::io(dir.as_str(), &error))?;
        for entry in entries {
            let entry = entry.map_err(|error| TaskError::io(dir.as_str(), &error))?;
            let file_type = entry
                .file_type()
                .map_err(|error| TaskError::io(entry.path().as_str(), &error))?;
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path.to_path_buf());
            } else if path.extension() == Some(PART_EXTENSION) {
                let relative = path.strip_prefix(parts_dir).unwrap_or(path);
                parts.push(relative.as_str().replace('\\', "/"));
            }
        }
    }
    parts.sort();
    Ok(parts)
}

/// Handler for the `database` command.
///
/// Regeneration runs on a [`BackgroundTask`]; the handler blocks until the
/// task is terminal so the response reports the real outcome. Progress goes
/// to the configured sink. Parameters optionally name a different parts
/// folder.
pub struct DatabaseService {
    regenerator: Arc<dyn DatabaseRegenerator>,
    parts_dir: Utf8PathBuf,
    database: Utf8PathBuf,
    sink: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for DatabaseService {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DatabaseService")
            .field("parts_dir", &self.parts_dir)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl DatabaseService {
    /// Creates the handler.
    #[must_use]
    pub fn new(
        regenerator: Arc<dyn DatabaseRegenerator>,
        parts_dir: impl Into<Utf8PathBuf>,
        database: impl Into<Utf8PathBuf>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            regenerator,
            parts_dir: parts_dir.into(),
            database: database.into(),
            sink,
        }
    }
}

impl ServiceHandler for DatabaseService {
    fn handle(&mut self, params: &str) -> Result<CommandResult, ServiceError> {
        let parts_dir = resolve_input(params, Utf8Path::new(""), &self.parts_dir);
        if !parts_dir.is_dir() {
            return Err(ServiceError::invalid_params(format!(
                "parts folder {parts_dir} does not exist"
            )));
        }

        let regenerator = Arc::clone(&self.regenerator);
        let database = self.database.clone();
        let task_parts_dir = parts_dir.clone();
        let handle = BackgroundTask::spawn(
            "database",
            move |context: &TaskContext<'_>| {
                regenerator.regenerate(&task_parts_dir, &database, context)
            },
            Arc::clone(&self.sink),
        );
        let summary = handle.wait()?;

        info!(
            target: SERVICES_TARGET,
            parts = summary.parts,
            database = %summary.database,
            "parts database regenerated"
        );
        Ok(CommandResult::ok(format!(
            "database: indexed {} part(s) from {parts_dir} into {}\n",
            summary.parts, summary.database
        )))
    }
}
