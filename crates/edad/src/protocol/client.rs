//! One-shot client for the command port.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use super::{ClientError, Command, CommandResult, decode_response, encode_request};

/// Sends `command` to the daemon at `addr` and reads the full response.
///
/// `timeout` bounds the connect and each socket read and write; the daemon
/// itself imposes no execution deadline, so long services need a generous
/// value.
///
/// # Errors
///
/// Returns [`ClientError::Io`] when the exchange fails at the socket level
/// (including the daemon closing the connection without a reply) and
/// [`ClientError::Protocol`] when the reply cannot be decoded.
pub fn send_command(
    addr: SocketAddr,
    command: &Command,
    timeout: Duration,
) -> Result<CommandResult, ClientError> {
    let mut stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    stream.write_all(&encode_request(command))?;
    stream.flush()?;
    stream.shutdown(Shutdown::Write)?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response)?;
    if response.is_empty() {
        return Err(ClientError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed without a response",
        )));
    }
    Ok(decode_response(&response)?)
}
