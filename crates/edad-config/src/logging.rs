//! Log rendering for the daemon.
//!
//! Logs always go to standard error. Standard output carries batch command
//! bodies and nothing else, so every format here is a rendering of the
//! stderr stream only.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use thiserror::Error;

/// How log events are rendered on standard error.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    ///
    /// Event fields are flattened beside `message`, so `service`, `peer` and
    /// `command` are top-level keys rather than members of a nested `fields`
    /// object.
    #[default]
    Json,
    /// Single-line text for an operator at a terminal.
    Compact,
}

impl LogFormat {
    /// Returns true when each event is a self-contained JSON record.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }

    /// Decides whether colour escapes may be written.
    ///
    /// Structured output never carries them; text output does only when
    /// standard error is a terminal.
    #[must_use]
    pub const fn uses_ansi(self, stderr_is_terminal: bool) -> bool {
        !self.is_structured() && stderr_is_terminal
    }
}

/// Error raised when a log format name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log format `{name}`; expected `json` or `compact`")]
pub struct LogFormatParseError {
    name: String,
}

impl LogFormatParseError {
    /// Returns the rejected name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for LogFormat {
    type Err = LogFormatParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let name = text.trim();
        if name.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else if name.eq_ignore_ascii_case("compact") {
            Ok(Self::Compact)
        } else {
            Err(LogFormatParseError {
                name: name.to_owned(),
            })
        }
    }
}
