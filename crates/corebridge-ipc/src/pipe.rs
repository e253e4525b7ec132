use std::path::{Path, PathBuf};

use crate::error::IpcError;

/// Namespace prefix of Windows named pipes.
pub const PIPE_PREFIX: &str = r"\\.\pipe\";

/// File name prefix .NET uses for named-pipe sockets on Unix.
pub const UNIX_SOCKET_PREFIX: &str = "CoreFxPipe_";

/// Strip the Windows pipe namespace from a name, if present.
pub fn short_name(name: &str) -> &str {
    name.strip_prefix(PIPE_PREFIX)
        .or_else(|| name.strip_prefix(r"\\?\pipe\"))
        .unwrap_or(name)
}

/// Full Windows pipe path for `name`. Names already starting with `\\` are kept.
pub fn windows_pipe_path(name: &str) -> String {
    if name.starts_with(r"\\") {
        name.to_string()
    } else {
        format!("{PIPE_PREFIX}{name}")
    }
}

/// Unix domain socket backing the pipe `name`. Absolute paths are kept.
pub fn unix_socket_path(name: &str, socket_dir: &Path) -> PathBuf {
    if name.starts_with('/') {
        PathBuf::from(name)
    } else {
        socket_dir.join(format!("{UNIX_SOCKET_PREFIX}{}", short_name(name)))
    }
}

/// Resolve a caller-supplied pipe name to the endpoint for this platform.
pub fn endpoint_path(name: &str) -> Result<PathBuf, IpcError> {
    if short_name(name).is_empty() {
        return Err(IpcError::EmptyPipeName);
    }

    #[cfg(windows)]
    let path = PathBuf::from(windows_pipe_path(name));
    #[cfg(not(windows))]
    let path = unix_socket_path(name, &std::env::temp_dir());

    Ok(path)
}
