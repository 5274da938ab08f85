//! Connection manager
//!
//! Owns the single outbound stream to the consumer. The connection is made
//! once, at construction. If that fails, or no endpoint is configured, the
//! manager is disabled for good and every send is a cheap no-op.
//!
//! A connected manager never reconnects and never disables itself: each
//! send is independently best-effort, and a failed write only loses that
//! one frame.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, DisabledReason, Result};

/// Outbound, write-only, newline-framed stream to the consumer
pub struct Connection {
    state: State,
}

enum State {
    Disabled(DisabledReason),
    Connected(Mutex<Channel>),
}

struct Channel {
    writer: Box<dyn Write + Send>,
    /// Budget for writing one whole frame
    send_timeout: Option<Duration>,
    /// A previous frame was only partially written
    torn: bool,
}

impl Connection {
    /// Connect to the endpoint named by `config`, or come up disabled.
    pub fn from_config(config: &BridgeConfig) -> Self {
        let Some(path) = config.socket_path.as_deref() else {
            tracing::debug!("no progress socket configured, telemetry disabled");
            return Self::disabled(DisabledReason::NotConfigured);
        };

        match Self::connect(path, config.send_timeout) {
            Ok(connection) => {
                tracing::debug!(path = %path.display(), "connected to progress socket");
                connection
            }
            Err(BridgeError::Disabled(reason)) => Self::disabled(reason),
            Err(e) => {
                tracing::debug!(error = %e, "progress socket unavailable, telemetry disabled");
                Self::disabled(DisabledReason::ConnectFailed)
            }
        }
    }

    /// Connect to a Unix stream socket.
    #[cfg(unix)]
    pub fn connect(path: &Path, send_timeout: Option<Duration>) -> Result<Self> {
        use std::os::unix::net::UnixStream;

        let stream = UnixStream::connect(path).map_err(|source| BridgeError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        let send_timeout = send_timeout.filter(|t| !t.is_zero());
        stream.set_write_timeout(send_timeout)?;

        Ok(Self::from_writer_with_timeout(stream, send_timeout))
    }

    #[cfg(not(unix))]
    pub fn connect(_path: &Path, _send_timeout: Option<Duration>) -> Result<Self> {
        Err(BridgeError::Disabled(DisabledReason::Unsupported))
    }

    /// Use an already-open writer as the channel.
    pub fn from_writer<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self::from_writer_with_timeout(writer, None)
    }

    /// Use an already-open writer, giving up on a frame once `send_timeout`
    /// has passed since its first byte was attempted.
    pub fn from_writer_with_timeout<W>(writer: W, send_timeout: Option<Duration>) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            state: State::Connected(Mutex::new(Channel {
                writer: Box::new(writer),
                send_timeout,
                torn: false,
            })),
        }
    }

    /// A connection that drops everything.
    pub fn disabled(reason: DisabledReason) -> Self {
        Self {
            state: State::Disabled(reason),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, State::Connected(_))
    }

    pub fn disabled_reason(&self) -> Option<DisabledReason> {
        match self.state {
            State::Disabled(reason) => Some(reason),
            State::Connected(_) => None,
        }
    }

    /// Write one complete frame.
    ///
    /// The frame must already carry its trailing newline. A disabled
    /// connection returns [`BridgeError::Disabled`] without doing any I/O.
    pub fn send(&self, frame: &[u8]) -> Result<()> {
        let channel = match &self.state {
            State::Disabled(reason) => return Err(BridgeError::Disabled(*reason)),
            State::Connected(channel) => channel,
        };

        let mut channel = channel.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = channel.send_timeout.map(|t| Instant::now() + t);

        if channel.torn {
            // End the dangling fragment so the consumer can resync on the next line.
            let (_, result) = write_counted(&mut channel.writer, b"\n", deadline);
            result?;
            channel.torn = false;
        }

        let (written, result) = write_counted(&mut channel.writer, frame, deadline);
        if result.is_err() && written > 0 && written < frame.len() {
            channel.torn = true;
        }
        result?;
        Ok(())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Disabled(reason) => f.debug_tuple("Connection::Disabled").field(reason).finish(),
            State::Connected(_) => f.write_str("Connection::Connected"),
        }
    }
}

/// `write_all` that reports how far it got before failing.
///
/// The socket timeout only bounds a single `write`, so a consumer draining a
/// few bytes at a time is cut off here once `deadline` passes.
fn write_counted(
    writer: &mut dyn Write,
    buf: &[u8],
    deadline: Option<Instant>,
) -> (usize, io::Result<()>) {
    let mut written = 0;
    while written < buf.len() {
        if written > 0 && deadline.is_some_and(|d| Instant::now() >= d) {
            return (
                written,
                Err(io::Error::new(io::ErrorKind::TimedOut, "frame send deadline passed")),
            );
        }
        match writer.write(&buf[written..]) {
            Ok(0) => {
                return (
                    written,
                    Err(io::Error::new(io::ErrorKind::WriteZero, "peer stopped reading")),
                )
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return (written, Err(e)),
        }
    }
    (written, writer.flush())
}
