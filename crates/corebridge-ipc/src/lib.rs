//! Wire format shared by the corebridge host and its out-of-process observer.
//!
//! The host writes one [`LogMessage`] per line to a named pipe; the observer
//! reads them back with [`decode_frame`]. Pipe names are resolved to a
//! platform endpoint with [`endpoint_path`].

pub mod error;
pub mod message;
pub mod pipe;

pub use error::IpcError;
pub use message::{LogLevel, LogMessage, decode_frame, encode_frame, read_frames};
pub use pipe::endpoint_path;
