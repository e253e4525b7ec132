//! Best-effort leveled logging over named pipes.
//!
//! A write that fails is reported as [`HostError::LoggingUnavailable`] by
//! [`PipeLogger::write_log`]. The hosting operations only ever go through
//! [`PipeLogger::log`], which records the failure with `tracing` and drops it.
//!
//! Connecting and writing are bounded by [`PIPE_TIMEOUT`]. A reader that is
//! attached but stops draining the pipe gets its channel disabled for the
//! rest of the session instead of blocking the caller again.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use corebridge_ipc::{LogLevel, LogMessage, encode_frame};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::HostError;

/// Upper bound for opening a pipe and for writing one frame to it.
pub const PIPE_TIMEOUT: Duration = Duration::from_millis(500);

/// Opens the write end of a pipe channel.
///
/// Writers must not block indefinitely: a reader that stops draining should
/// surface as `TimedOut`, `WouldBlock` or `WriteZero`.
pub trait PipeConnector: Send + Sync {
    fn connect(&self, pipename: &str) -> io::Result<Box<dyn Write + Send>>;
}

/// Connects to the platform pipe endpoint named by the caller: a Windows
/// named pipe, or the Unix domain socket .NET uses for the same name.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamedPipeConnector;

impl PipeConnector for NamedPipeConnector {
    fn connect(&self, pipename: &str) -> io::Result<Box<dyn Write + Send>> {
        let endpoint = corebridge_ipc::endpoint_path(pipename)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        #[cfg(windows)]
        {
            use std::os::windows::io::AsRawHandle;
            use windows_sys::Win32::System::Pipes::{
                PIPE_NOWAIT, PIPE_READMODE_BYTE, SetNamedPipeHandleState,
            };

            let pipe = std::fs::OpenOptions::new().write(true).open(&endpoint)?;
            let mode = PIPE_READMODE_BYTE | PIPE_NOWAIT;
            // SAFETY: the handle is open for the duration of the call and
            // the mode pointer refers to a live local.
            let ok = unsafe {
                SetNamedPipeHandleState(
                    pipe.as_raw_handle() as _,
                    &mode,
                    std::ptr::null(),
                    std::ptr::null(),
                )
            };
            if ok == 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(Box::new(pipe))
        }
        #[cfg(unix)]
        {
            use socket2::{Domain, SockAddr, Socket, Type};
            use std::os::unix::net::UnixStream;

            let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
            socket.connect_timeout(&SockAddr::unix(&endpoint)?, PIPE_TIMEOUT)?;
            let stream = UnixStream::from(socket);
            stream.set_nonblocking(false)?;
            stream.set_write_timeout(Some(PIPE_TIMEOUT))?;
            Ok(Box::new(stream))
        }
        #[cfg(not(any(windows, unix)))]
        {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("no pipe transport for {}", endpoint.display()),
            ))
        }
    }
}

struct PipeChannel {
    /// `None` once a write failed; the frame stream may be torn.
    writer: Option<Box<dyn Write + Send>>,
    sender_id: Uuid,
}

type SharedChannel = Arc<Mutex<PipeChannel>>;

enum Slot {
    Open(SharedChannel),
    /// The reader stopped draining. Cleared by `disconnect`.
    Stalled,
}

fn is_stall(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::WriteZero
    )
}

/// Per-pipe-name cache of open channels.
///
/// A channel is opened on the first write to its name and kept until
/// [`disconnect`](Self::disconnect) or until a write to it fails. Each channel
/// has its own lock, so frames never interleave and a slow pipe only holds up
/// writers to that pipe. The name map is never locked across I/O.
pub struct PipeLogger {
    connector: Box<dyn PipeConnector>,
    channels: Mutex<HashMap<String, Slot>>,
    mirror_to_tracing: bool,
}

impl PipeLogger {
    pub fn new(connector: impl PipeConnector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            channels: Mutex::new(HashMap::new()),
            mirror_to_tracing: true,
        }
    }

    pub fn with_tracing_mirror(mut self, enabled: bool) -> Self {
        self.mirror_to_tracing = enabled;
        self
    }

    fn channel(&self, pipename: &str) -> Result<SharedChannel, HostError> {
        match self.channels.lock().get(pipename) {
            Some(Slot::Open(channel)) => return Ok(Arc::clone(channel)),
            Some(Slot::Stalled) => {
                return Err(HostError::LoggingUnavailable(format!(
                    "pipe {pipename} stopped reading"
                )));
            }
            None => {}
        }

        let writer = self.connector.connect(pipename).map_err(|e| {
            HostError::LoggingUnavailable(format!("cannot open pipe {pipename}: {e}"))
        })?;

        let mut channels = self.channels.lock();
        let slot = channels.entry(pipename.to_string()).or_insert_with(|| {
            tracing::debug!(pipe = pipename, "Pipe channel opened");
            Slot::Open(Arc::new(Mutex::new(PipeChannel {
                writer: Some(writer),
                sender_id: Uuid::new_v4(),
            })))
        });
        match slot {
            Slot::Open(channel) => Ok(Arc::clone(channel)),
            Slot::Stalled => Err(HostError::LoggingUnavailable(format!(
                "pipe {pipename} stopped reading"
            ))),
        }
    }

    /// Forget `channel` if it is still the one cached for `pipename`.
    fn retire(&self, pipename: &str, channel: &SharedChannel, stalled: bool) {
        let mut channels = self.channels.lock();
        let current = matches!(
            channels.get(pipename),
            Some(Slot::Open(cached)) if Arc::ptr_eq(cached, channel)
        );
        if !current {
            return;
        }
        if stalled {
            tracing::warn!(pipe = pipename, "Pipe reader stalled; channel disabled");
            channels.insert(pipename.to_string(), Slot::Stalled);
        } else {
            // Reconnect on the next write; the reader may come back.
            channels.remove(pipename);
        }
    }

    /// Write one framed entry, opening the channel if needed.
    pub fn write_log(&self, pipename: &str, level: LogLevel, message: &str) -> Result<(), HostError> {
        if pipename.is_empty() {
            return Err(HostError::LoggingUnavailable("no pipe name".into()));
        }

        let shared = self.channel(pipename)?;
        let mut guard = shared.lock();
        let channel = &mut *guard;
        let Some(writer) = channel.writer.as_mut() else {
            return Err(HostError::LoggingUnavailable(format!(
                "pipe {pipename} closed after a failed write"
            )));
        };

        let frame = encode_frame(&LogMessage::new(level, message, channel.sender_id))
            .map_err(|e| HostError::LoggingUnavailable(e.to_string()))?;

        let written = writer.write_all(&frame).and_then(|()| writer.flush());
        if let Err(e) = written {
            channel.writer = None;
            drop(guard);
            self.retire(pipename, &shared, is_stall(&e));
            return Err(HostError::LoggingUnavailable(format!(
                "write to pipe {pipename} failed: {e}"
            )));
        }
        Ok(())
    }

    /// Write an entry, swallowing any failure.
    pub fn log(&self, pipename: &str, level: LogLevel, message: impl AsRef<str>) {
        let message = message.as_ref();
        if self.mirror_to_tracing {
            match level {
                LogLevel::Info => tracing::info!(pipe = pipename, "{message}"),
                LogLevel::Error => tracing::error!(pipe = pipename, "{message}"),
            }
        }
        if pipename.is_empty() {
            return;
        }
        if let Err(e) = self.write_log(pipename, level, message) {
            tracing::warn!(pipe = pipename, error = %e, "Pipe log entry dropped");
        }
    }

    pub fn info(&self, pipename: &str, message: impl AsRef<str>) {
        self.log(pipename, LogLevel::Info, message);
    }

    pub fn error(&self, pipename: &str, message: impl AsRef<str>) {
        self.log(pipename, LogLevel::Error, message);
    }

    /// Close the channel for `pipename`. Returns whether one was open.
    pub fn disconnect(&self, pipename: &str) -> bool {
        let closed = matches!(self.channels.lock().remove(pipename), Some(Slot::Open(_)));
        if closed {
            tracing::debug!(pipe = pipename, "Pipe channel closed");
        }
        closed
    }

    /// Close every channel, including disabled ones. Returns how many were open.
    pub fn disconnect_all(&self) -> usize {
        let closed = self
            .channels
            .lock()
            .drain()
            .filter(|(_, slot)| matches!(slot, Slot::Open(_)))
            .count();
        if closed > 0 {
            tracing::debug!(channels = closed, "Pipe channels closed");
        }
        closed
    }

    pub fn is_connected(&self, pipename: &str) -> bool {
        matches!(self.channels.lock().get(pipename), Some(Slot::Open(_)))
    }
}
