//! Line-based request/response framing for the command port.
//!
//! ## Requests
//!
//! A client sends exactly one line per connection:
//!
//! ```text
//! drc sketches/blink.fzz\n
//! ```
//!
//! The command name runs up to the first whitespace character and the
//! parameters run from the character after it to the end of the line, so the
//! parameters may themselves contain whitespace. A `\r` before the newline is
//! tolerated.
//!
//! ## Responses
//!
//! The daemon answers with an HTTP-style status line, a single content type
//! header, a blank separator, and the body, then closes the connection:
//!
//! ```text
//! 200 OK\n
//! Content-Type: text/plain\n
//! \n
//! DRC passed: blink.fzz has no overlapping parts\n
//! ```

pub mod client;
mod errors;

use std::fmt;

pub use self::errors::{ClientError, ProtocolError};

const CONTENT_TYPE: &str = "Content-Type:";

/// MIME type used for plain-text bodies.
pub const TEXT_PLAIN: &str = "text/plain";

/// Status codes used by the command protocol.
pub mod status {
    /// Command completed.
    pub const OK: u16 = 200;
    /// Request line could not be decoded or parameters were invalid.
    pub const BAD_REQUEST: u16 = 400;
    /// Command exists but the active service does not enable it.
    pub const FORBIDDEN: u16 = 403;
    /// No service answers to the command name.
    pub const NOT_FOUND: u16 = 404;
    /// The handler failed.
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    /// No collaborator is installed for the service.
    pub const NOT_IMPLEMENTED: u16 = 501;
    /// The daemon is shutting down.
    pub const SERVICE_UNAVAILABLE: u16 = 503;

    /// Returns the canonical reason phrase for `code`.
    #[must_use]
    pub const fn reason(code: u16) -> &'static str {
        match code {
            OK => "OK",
            BAD_REQUEST => "Bad Request",
            FORBIDDEN => "Forbidden",
            NOT_FOUND => "Not Found",
            INTERNAL_SERVER_ERROR => "Internal Server Error",
            NOT_IMPLEMENTED => "Not Implemented",
            SERVICE_UNAVAILABLE => "Service Unavailable",
            200..=299 => "Success",
            400..=499 => "Client Error",
            _ => "Server Error",
        }
    }
}

/// One decoded command frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    params: String,
}

impl Command {
    /// Builds a command, validating that it can be framed on one line.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Empty`] for an empty name,
    /// [`ProtocolError::InvalidName`] when the name holds whitespace or
    /// control characters, and [`ProtocolError::EmbeddedLineBreak`] when the
    /// parameters hold a line break.
    pub fn new(name: impl Into<String>, params: impl Into<String>) -> Result<Self, ProtocolError> {
        let command_name = name.into();
        let raw_params = params.into();
        if command_name.is_empty() {
            return Err(ProtocolError::Empty);
        }
        if command_name
            .chars()
            .any(|ch| ch.is_whitespace() || ch.is_control())
        {
            return Err(ProtocolError::InvalidName { name: command_name });
        }
        if raw_params.contains(['\n', '\r']) {
            return Err(ProtocolError::EmbeddedLineBreak);
        }
        Ok(Self {
            name: command_name,
            params: raw_params,
        })
    }

    /// Command name as sent by the client.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw parameter text; may be empty.
    #[must_use]
    pub fn params(&self) -> &str {
        &self.params
    }
}

impl fmt::Display for Command {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            formatter.write_str(&self.name)
        } else {
            write!(formatter, "{} {}", self.name, self.params)
        }
    }
}

/// Outcome of one command, written back as the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    status_code: u16,
    status_text: String,
    mime_type: String,
    body: String,
}

impl CommandResult {
    /// Builds a result; line breaks in the status text and MIME type are
    /// replaced with spaces so the header block stays well-formed.
    #[must_use]
    pub fn new(
        status_code: u16,
        status_text: impl Into<String>,
        mime_type: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            status_code,
            status_text: single_line(status_text.into()),
            mime_type: single_line(mime_type.into()),
            body: body.into(),
        }
    }

    /// Plain-text result with the canonical reason phrase for `status_code`.
    #[must_use]
    pub fn text(status_code: u16, body: impl Into<String>) -> Self {
        Self::new(status_code, status::reason(status_code), TEXT_PLAIN, body)
    }

    /// `200 OK` plain-text result.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self::text(status::OK, body)
    }

    /// `503 Service Unavailable` result.
    #[must_use]
    pub fn service_unavailable(reason: &str) -> Self {
        Self::text(status::SERVICE_UNAVAILABLE, format!("{reason}\n"))
    }

    /// Numeric status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Status reason text.
    #[must_use]
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// MIME type of the body.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Response body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns true for 2xx status codes.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }
}

fn single_line(value: String) -> String {
    if value.contains(['\n', '\r']) {
        value.replace(['\n', '\r'], " ")
    } else {
        value
    }
}

/// Encodes a command as a newline-terminated request line.
#[must_use]
pub fn encode_request(command: &Command) -> Vec<u8> {
    let mut line = command.to_string().into_bytes();
    line.push(b'\n');
    line
}

/// Decodes one newline-terminated request line.
///
/// Decoding is total: every input yields either a [`Command`] or a
/// [`ProtocolError`].
///
/// # Errors
///
/// Returns a [`ProtocolError`] describing the first framing rule the input
/// breaks.
pub fn decode_request(frame: &[u8]) -> Result<Command, ProtocolError> {
    let Some(terminated) = frame.strip_suffix(b"\n") else {
        return Err(ProtocolError::MissingTerminator);
    };
    let line = terminated.strip_suffix(b"\r").unwrap_or(terminated);
    if line.iter().any(|byte| matches!(byte, b'\n' | b'\r')) {
        return Err(ProtocolError::EmbeddedLineBreak);
    }
    let text = std::str::from_utf8(line).map_err(|_| ProtocolError::NotUtf8)?;
    if text.is_empty() {
        return Err(ProtocolError::Empty);
    }
    if text.starts_with(char::is_whitespace) {
        return Err(ProtocolError::MissingName);
    }

    let (name, params) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    Command::new(name, params)
}

/// Encodes a result as status line, content type header, blank line, body.
#[must_use]
pub fn encode_response(result: &CommandResult) -> Vec<u8> {
    format!(
        "{} {}\n{CONTENT_TYPE} {}\n\n{}",
        result.status_code, result.status_text, result.mime_type, result.body
    )
    .into_bytes()
}

/// Decodes a complete response as read until connection close.
///
/// # Errors
///
/// Returns a [`ProtocolError`] when the header block is malformed or the
/// response is not UTF-8.
pub fn decode_response(bytes: &[u8]) -> Result<CommandResult, ProtocolError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::NotUtf8)?;

    let (status_line, after_status) = split_line(text).ok_or_else(|| ProtocolError::MalformedStatusLine {
        line: text.to_owned(),
    })?;
    let (code, status_text) =
        status_line
            .split_once(' ')
            .ok_or_else(|| ProtocolError::MalformedStatusLine {
                line: status_line.to_owned(),
            })?;
    let status_code = code
        .parse::<u16>()
        .map_err(|_| ProtocolError::MalformedStatusLine {
            line: status_line.to_owned(),
        })?;

    let (header, after_header) =
        split_line(after_status).ok_or_else(|| ProtocolError::MalformedHeader {
            line: after_status.to_owned(),
        })?;
    let mime_type = header
        .strip_prefix(CONTENT_TYPE)
        .map(str::trim)
        .ok_or_else(|| ProtocolError::MalformedHeader {
            line: header.to_owned(),
        })?;

    let body = after_header
        .strip_prefix('\n')
        .ok_or(ProtocolError::MissingSeparator)?;

    Ok(CommandResult::new(status_code, status_text, mime_type, body))
}

fn split_line(text: &str) -> Option<(&str, &str)> {
    text.split_once('\n')
}
