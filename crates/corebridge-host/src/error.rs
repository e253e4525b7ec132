use std::fmt::Display;

use thiserror::Error;

use crate::marshal::MarshalError;

/// Status codes returned across the C ABI. `OK` is success; every other
/// value names exactly one [`HostError`] variant.
pub mod status {
    pub const OK: i32 = 0;
    pub const ALREADY_STARTED: i32 = 1;
    pub const ALREADY_SHUTDOWN: i32 = 2;
    pub const NOT_STARTED: i32 = 3;
    pub const INITIALIZATION_FAILED: i32 = 4;
    pub const INVALID_ARGUMENT: i32 = 5;
    pub const ASSEMBLY_NOT_FOUND: i32 = 6;
    pub const TYPE_NOT_FOUND: i32 = 7;
    pub const METHOD_NOT_FOUND: i32 = 8;
    pub const MANAGED_INVOCATION_FAILED: i32 = 9;
    pub const ENCODING_ERROR: i32 = 10;
    pub const LOGGING_UNAVAILABLE: i32 = 11;
    pub const RESOLUTION_FAILED: i32 = 12;
    pub const INTERNAL: i32 = 13;
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("runtime already started")]
    AlreadyStarted,

    #[error("runtime already shut down; it cannot be started again in this process")]
    AlreadyShutdown,

    #[error("runtime not started")]
    NotStarted,

    #[error("runtime initialization failed: {0}")]
    InitializationFailed(String),

    #[error("invalid argument `{field}`: {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    #[error("assembly not found: {0}")]
    AssemblyNotFound(String),

    #[error("type not found: {0}")]
    TypeNotFound(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("delegate resolution failed: {0}")]
    ResolutionFailed(String),

    #[error("managed invocation failed: {0}")]
    ManagedInvocationFailed(String),

    #[error("encoding error: {0}")]
    EncodingError(#[from] MarshalError),

    #[error("logging unavailable: {0}")]
    LoggingUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HostError {
    pub fn invalid_argument(field: &'static str, reason: impl Display) -> Self {
        HostError::InvalidArgument {
            field,
            reason: reason.to_string(),
        }
    }

    pub fn status_code(&self) -> i32 {
        match self {
            HostError::AlreadyStarted => status::ALREADY_STARTED,
            HostError::AlreadyShutdown => status::ALREADY_SHUTDOWN,
            HostError::NotStarted => status::NOT_STARTED,
            HostError::InitializationFailed(_) => status::INITIALIZATION_FAILED,
            HostError::InvalidArgument { .. } => status::INVALID_ARGUMENT,
            HostError::AssemblyNotFound(_) => status::ASSEMBLY_NOT_FOUND,
            HostError::TypeNotFound(_) => status::TYPE_NOT_FOUND,
            HostError::MethodNotFound(_) => status::METHOD_NOT_FOUND,
            HostError::ManagedInvocationFailed(_) => status::MANAGED_INVOCATION_FAILED,
            HostError::EncodingError(_) => status::ENCODING_ERROR,
            HostError::LoggingUnavailable(_) => status::LOGGING_UNAVAILABLE,
            HostError::ResolutionFailed(_) => status::RESOLUTION_FAILED,
            HostError::Internal(_) => status::INTERNAL,
        }
    }
}
