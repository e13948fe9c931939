//! Newline-delimited JSON control protocol over the daemon's Unix socket.
//!
//! The command set is closed: a request line either parses into a
//! [`DaemonRequest`] variant or is answered with an error reply, so no
//! unknown command ever reaches the runtime.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

/// Daemon startup leaves a short window where the socket file exists but
/// nothing accepts on it yet; status polls ride that window out.
const STATUS_RETRIES: u32 = 4;
const STATUS_RETRY_DELAY: Duration = Duration::from_millis(100);

/// One request line, e.g. `{"cmd":"sync"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DaemonRequest {
    /// Runtime snapshot: online flag, pending count, last drain.
    Status,
    /// Run one drain pass now and reply with its summary.
    Sync,
    /// Graceful shutdown.
    Stop,
}

/// One reply line: `{"outcome":"ok","data":...}` or
/// `{"outcome":"error","message":"..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DaemonReply {
    Ok { data: Value },
    Error { message: String },
}

impl DaemonReply {
    pub fn ok(data: Value) -> Self {
        Self::Ok { data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Unwrap the payload; an error reply becomes [`DaemonError::Protocol`].
    pub fn into_data(self) -> Result<Value, DaemonError> {
        match self {
            Self::Ok { data } => Ok(data),
            Self::Error { message } => Err(DaemonError::Protocol(message)),
        }
    }
}

fn connect(socket: &Path) -> Result<UnixStream, DaemonError> {
    UnixStream::connect(socket).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound
        | std::io::ErrorKind::ConnectionRefused
        | std::io::ErrorKind::ConnectionReset => DaemonError::DaemonNotRunning {
            socket: socket.to_path_buf(),
        },
        _ => io_err(socket, err),
    })
}

/// Send one request to the daemon socket and read back one reply line.
pub fn send_request(home: &Path, request: DaemonRequest) -> Result<DaemonReply, DaemonError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning { socket });
    }

    let mut stream = connect(&socket)?;
    let mut payload = serde_json::to_string(&request)?;
    payload.push('\n');
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(&socket, e))?;
    stream.flush().map_err(|e| io_err(&socket, e))?;

    let mut line = String::new();
    let read = BufReader::new(stream)
        .read_line(&mut line)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before replying".to_string(),
        ));
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

/// Fetch the daemon's status payload, retrying briefly while it starts up.
pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let mut retries_left = STATUS_RETRIES;
    loop {
        match send_request(home, DaemonRequest::Status) {
            Err(DaemonError::DaemonNotRunning { .. }) if retries_left > 0 => {
                retries_left -= 1;
                sleep(STATUS_RETRY_DELAY);
            }
            Err(err) => return Err(err),
            Ok(reply) => return reply.into_data(),
        }
    }
}

/// Ask the daemon for an immediate drain pass; returns the pass summary.
pub fn request_sync(home: &Path) -> Result<Value, DaemonError> {
    send_request(home, DaemonRequest::Sync)?.into_data()
}

/// Request graceful shutdown.
pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    send_request(home, DaemonRequest::Stop)?.into_data().map(|_| ())
}
