use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("empty frame")]
    EmptyFrame,

    #[error("unknown log level tag: {0}")]
    UnknownLevel(u8),

    #[error("pipe name is empty")]
    EmptyPipeName,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
