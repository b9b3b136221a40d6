//! Output files that only appear under their final name once complete.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

use super::TASK_TARGET;

/// File written to a `.partial` sibling and renamed into place on commit.
///
/// Dropping an uncommitted file removes the partial output, so a cancelled
/// or failed task never leaves a file that looks finished.
#[derive(Debug)]
pub struct StagedFile {
    target: Utf8PathBuf,
    partial: Utf8PathBuf,
    writer: Option<BufWriter<File>>,
}

impl StagedFile {
    /// Creates the partial file next to `target`, creating parent folders.
    ///
    /// # Errors
    ///
    /// Returns the IO error raised while creating folders or the file.
    pub fn create(target: &Utf8Path) -> io::Result<Self> {
        if let Some(parent) = target.parent().filter(|parent| !parent.as_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let partial = Utf8PathBuf::from(format!("{target}.partial"));
        let file = File::create(&partial)?;
        Ok(Self {
            target: target.to_path_buf(),
            partial,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Final path the output is renamed to on commit.
    #[must_use]
    pub fn target(&self) -> &Utf8Path {
        &self.target
    }

    /// Temporary path receiving writes until commit.
    #[must_use]
    pub fn partial_path(&self) -> &Utf8Path {
        &self.partial
    }

    /// Flushes, syncs, and renames the output to its final path.
    ///
    /// # Errors
    ///
    /// Returns the IO error raised while flushing or renaming; the partial
    /// file is removed in that case.
    pub fn commit(mut self) -> io::Result<Utf8PathBuf> {
        let Some(writer) = self.writer.take() else {
            return Err(io::Error::other("staged file already closed"));
        };
        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&self.partial, &self.target)?;
        Ok(self.target.clone())
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::other("staged file already closed"))
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        drop(self.writer.take());
        match fs::remove_file(&self.partial) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => {
                warn!(
                    target: TASK_TARGET,
                    file = %self.partial,
                    error = %error,
                    "failed to remove partial output"
                );
            }
            _ => {}
        }
    }
}
