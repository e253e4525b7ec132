//! Native bridge that hosts the .NET runtime in the current process and
//! calls managed entry points.
//!
//! [`RuntimeHost`] owns the hosted runtime and its lifecycle
//! (`Uninitialized → Started → Stopped`, never restarted). Entry points are
//! resolved into opaque [`DelegateHandle`]s and invoked with a single bounded
//! string payload. Status and error events go to an out-of-process observer
//! through [`PipeLogger`]; a broken pipe never fails a hosting operation.
//!
//! The C ABI in [`ffi`] (`StartCoreRuntime`, `CreateAssemblyDelegate`,
//! `ExecuteAssemblyFunction`, `UnloadRuntime`) drives one process-wide host
//! over the hostfxr backend.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use corebridge_host::{
//!     FunctionCallArguments, HostArguments, HostfxrBackend, NamedPipeConnector, PipeLogger,
//!     RuntimeHost,
//! };
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let logger = Arc::new(PipeLogger::new(NamedPipeConnector));
//! let host = RuntimeHost::new(HostfxrBackend::default(), logger);
//!
//! host.start(&HostArguments::new("/opt/app/App.dll", "/usr/share/dotnet", "app-log")?)?;
//!
//! let call = FunctionCallArguments::new("/opt/app/App.dll", "App.Entry, App", "Greet")?
//!     .with_pipename("app-log")?
//!     .with_payload("world")?;
//! host.execute_function(&call)?;
//!
//! host.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod ffi;
pub mod hostfxr;
pub mod invoker;
pub mod logger;
pub mod marshal;
pub mod resolver;

pub use args::{FunctionCall, FunctionCallArguments, HostArguments, HostConfig};
pub use backend::{DelegateTarget, EntryPoint, HostedRuntime, HostingBackend, RawDelegate};
pub use config::BridgeConfig;
pub use controller::{HostStatus, RuntimeHost};
pub use corebridge_ipc::LogLevel;
pub use error::{HostError, status};
pub use hostfxr::HostfxrBackend;
pub use logger::{NamedPipeConnector, PipeConnector, PipeLogger};
pub use marshal::{MarshalError, RuntimeChar, RuntimeString, WideBuf};
pub use resolver::DelegateHandle;
