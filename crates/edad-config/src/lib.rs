//! Shared configuration for the headless EDA service daemon.
//!
//! Configuration is layered with `ortho_config`: built-in defaults, then an
//! optional TOML file (`--config-path` or `EDAD_CONFIG_PATH`), then `EDAD_*`
//! environment variables, then command-line flags. The resolved [`Config`]
//! selects the single [`ServiceType`] the process runs for its whole
//! lifetime and the TCP endpoint of the command listener.

mod defaults;
mod endpoint;
mod logging;
mod service;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_PORT, DEFAULT_READ_TIMEOUT_MS, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use endpoint::ServiceEndpoint;
pub use logging::{LogFormat, LogFormatParseError};
pub use service::ServiceType;

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "EDAD")]
#[serde(default)]
pub struct Config {
    /// Service run by this process; `none` disables the listener.
    #[ortho_config(default = ServiceType::NoService)]
    pub service: ServiceType,
    /// Host the command listener binds to.
    #[ortho_config(default = defaults::default_host())]
    pub host: String,
    /// TCP port of the command listener.
    #[ortho_config(default = DEFAULT_PORT)]
    pub port: u16,
    /// Deadline for receiving one complete command line, in milliseconds.
    #[ortho_config(default = DEFAULT_READ_TIMEOUT_MS)]
    pub read_timeout_ms: u64,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Folder holding input sketches for export services.
    #[ortho_config(default = defaults::default_input_dir())]
    pub input_dir: Utf8PathBuf,
    /// Folder receiving generated files.
    #[ortho_config(default = defaults::default_output_dir())]
    pub output_dir: Utf8PathBuf,
    /// Folder scanned when regenerating the parts database.
    #[ortho_config(default = defaults::default_parts_dir())]
    pub parts_dir: Utf8PathBuf,
    /// Parts database written by the database service.
    #[ortho_config(default = defaults::default_database_path())]
    pub database_path: Utf8PathBuf,
    /// Runs the active service once with these parameters instead of
    /// listening for commands.
    pub batch: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceType::default(),
            host: defaults::default_host(),
            port: DEFAULT_PORT,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            input_dir: defaults::default_input_dir(),
            output_dir: defaults::default_output_dir(),
            parts_dir: defaults::default_parts_dir(),
            database_path: defaults::default_database_path(),
            batch: None,
        }
    }
}

impl Config {
    /// Loads configuration from every layer using the process arguments.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any layer is malformed.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads configuration using `args` in place of the process arguments.
    ///
    /// The first item is the program name, as with `std::env::args_os`.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any layer is malformed.
    pub fn load_from_iter<I>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = OsString>,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Service selected for this process.
    #[must_use]
    pub const fn service(&self) -> ServiceType {
        self.service
    }

    /// Endpoint the command listener binds to.
    #[must_use]
    pub fn endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint::tcp(self.host.clone(), self.port)
    }

    /// Whole-frame read deadline applied to each connection.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Configured log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Folder holding input sketches.
    #[must_use]
    pub fn input_dir(&self) -> &Utf8Path {
        &self.input_dir
    }

    /// Folder receiving generated files.
    #[must_use]
    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// Folder scanned for part definitions.
    #[must_use]
    pub fn parts_dir(&self) -> &Utf8Path {
        &self.parts_dir
    }

    /// Parts database path.
    #[must_use]
    pub fn database_path(&self) -> &Utf8Path {
        &self.database_path
    }

    /// Parameters for a one-shot batch run, if requested.
    #[must_use]
    pub fn batch(&self) -> Option<&str> {
        self.batch.as_deref()
    }

    /// Rejects values that load cleanly but cannot drive the daemon.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValidationError`] for an empty host or a zero read
    /// timeout.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.host.trim().is_empty() {
            return Err(ConfigValidationError::EmptyHost);
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigValidationError::ZeroReadTimeout);
        }
        Ok(())
    }
}

/// Semantic errors found after configuration loaded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// Host was blank.
    #[error("listener host must not be empty")]
    EmptyHost,
    /// Read timeout was zero.
    #[error("read timeout must be greater than zero")]
    ZeroReadTimeout,
}
