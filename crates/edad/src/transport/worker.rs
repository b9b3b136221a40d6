//! Per-connection request handling.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{Connection, ConnectionHandler, FrameError, LISTENER_TARGET};
use crate::dispatch::{DispatchError, Dispatcher};
use crate::protocol::{CommandResult, decode_request, encode_response};

/// Longest request line accepted, terminator included.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

const CHUNK_BYTES: usize = 1024;

/// Serves one command per connection through the dispatch core.
///
/// The worker reads a single newline-terminated request within the read
/// deadline, answers it, and closes the connection. Connections that time
/// out, close early, or send an oversized line are closed without a reply.
#[derive(Debug, Clone)]
pub struct ConnectionWorker {
    dispatcher: Dispatcher,
    read_timeout: Duration,
}

impl ConnectionWorker {
    /// Creates a worker submitting to `dispatcher`.
    #[must_use]
    pub const fn new(dispatcher: Dispatcher, read_timeout: Duration) -> Self {
        Self {
            dispatcher,
            read_timeout,
        }
    }

    fn respond(&self, frame: &[u8], stopping: bool) -> CommandResult {
        if stopping {
            return DispatchError::Unavailable.to_command_result();
        }
        match decode_request(frame) {
            Ok(command) => self.dispatcher.execute(command),
            Err(error) => {
                debug!(target: LISTENER_TARGET, error = %error, "rejected malformed request");
                error.to_command_result()
            }
        }
    }
}

impl ConnectionHandler for ConnectionWorker {
    fn handle(&self, connection: Connection) {
        let Connection {
            mut stream,
            peer,
            stop,
        } = connection;

        let frame = match read_frame(&mut stream, self.read_timeout) {
            Ok(frame) => frame,
            Err(error) => {
                debug!(
                    target: LISTENER_TARGET,
                    peer = %peer,
                    error = %error,
                    "closing connection without a response"
                );
                return;
            }
        };

        let result = self.respond(&frame, stop.is_raised());
        if let Err(error) = write_response(&mut stream, &result, self.read_timeout) {
            warn!(
                target: LISTENER_TARGET,
                peer = %peer,
                error = %error,
                "failed to write response"
            );
        }
    }
}

/// Reads one request line, newline included, within `timeout`.
///
/// The deadline covers the whole line, so a client trickling bytes cannot
/// hold the connection open indefinitely. Bytes after the first newline are
/// ignored.
pub(crate) fn read_frame(stream: &mut TcpStream, timeout: Duration) -> Result<Vec<u8>, FrameError> {
    let deadline = Instant::now() + timeout;
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; CHUNK_BYTES];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(FrameError::TimedOut);
        }
        stream.set_read_timeout(Some(remaining))?;

        let bytes_read = match stream.read(&mut chunk) {
            Ok(read) => read,
            // Timeouts loop back so the deadline check decides.
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                continue;
            }
            Err(error) => return Err(FrameError::Io(error)),
        };
        if bytes_read == 0 {
            return Err(FrameError::Closed {
                received: buffer.len(),
            });
        }

        let (received, _) = chunk.split_at(bytes_read.min(CHUNK_BYTES));
        if let Some(position) = received.iter().position(|byte| *byte == b'\n') {
            let (line, _) = received.split_at(position + 1);
            buffer.extend_from_slice(line);
            enforce_request_limit(buffer.len())?;
            return Ok(buffer);
        }
        buffer.extend_from_slice(received);
        enforce_request_limit(buffer.len())?;
    }
}

fn enforce_request_limit(size: usize) -> Result<(), FrameError> {
    if size > MAX_REQUEST_BYTES {
        return Err(FrameError::TooLarge {
            limit: MAX_REQUEST_BYTES,
        });
    }
    Ok(())
}

fn write_response(stream: &mut TcpStream, result: &CommandResult, timeout: Duration) -> io::Result<()> {
    stream.set_write_timeout(Some(timeout))?;
    stream.write_all(&encode_response(result))?;
    stream.flush()?;
    match stream.shutdown(Shutdown::Write) {
        Err(error) if error.kind() != io::ErrorKind::NotConnected => Err(error),
        _ => Ok(()),
    }
}
