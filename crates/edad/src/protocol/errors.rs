//! Error types for command framing.

use std::io;

use thiserror::Error;

use super::{CommandResult, status};

/// Errors surfaced while encoding or decoding command frames.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The frame was not valid UTF-8.
    #[error("request is not valid UTF-8")]
    NotUtf8,
    /// The frame ended before its newline terminator.
    #[error("request line is not newline-terminated")]
    MissingTerminator,
    /// The request line held nothing but its terminator.
    #[error("empty request line")]
    Empty,
    /// The request line started with whitespace, leaving no command name.
    #[error("request line has no command name")]
    MissingName,
    /// A line break appeared inside the line or its parameters.
    #[error("request contains an embedded line break")]
    EmbeddedLineBreak,
    /// The command name contained a control or whitespace character.
    #[error("command name {name:?} contains an invalid character")]
    InvalidName {
        /// Offending name.
        name: String,
    },
    /// The response status line was not `<code> <text>`.
    #[error("malformed status line: {line:?}")]
    MalformedStatusLine {
        /// Offending line.
        line: String,
    },
    /// The response header line was missing or not a content type.
    #[error("malformed content type header: {line:?}")]
    MalformedHeader {
        /// Offending line.
        line: String,
    },
    /// The blank separator between headers and body was missing.
    #[error("missing blank line before response body")]
    MissingSeparator,
}

impl ProtocolError {
    /// Builds the `400 Bad Request` result returned for undecodable requests.
    #[must_use]
    pub fn to_command_result(&self) -> CommandResult {
        CommandResult::text(status::BAD_REQUEST, format!("{self}\n"))
    }
}

/// Errors surfaced by [`send_command`](super::client::send_command).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connecting, writing, or reading failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// The server reply could not be decoded.
    #[error("invalid response: {0}")]
    Protocol(#[from] ProtocolError),
}
