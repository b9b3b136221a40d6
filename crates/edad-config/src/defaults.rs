use camino::Utf8PathBuf;

/// Default TCP host; the command protocol is plaintext and loopback-oriented.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default TCP port for the command listener.
pub const DEFAULT_PORT: u16 = 7777;

/// Default whole-frame read timeout for a connection, in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

pub(crate) fn default_host() -> String {
    DEFAULT_HOST.to_owned()
}

pub(crate) fn default_input_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("sketches")
}

pub(crate) fn default_output_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("output")
}

pub(crate) fn default_parts_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("parts")
}

pub(crate) fn default_database_path() -> Utf8PathBuf {
    Utf8PathBuf::from("parts.db")
}
