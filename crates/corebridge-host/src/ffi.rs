//! C ABI exports. Every entry point returns a [`status`](crate::error::status)
//! code and never unwinds into the caller.

#![allow(non_snake_case)]

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use crate::args::{FunctionCallArguments, HostArguments};
use crate::config::BridgeConfig;
use crate::controller::RuntimeHost;
use crate::error::{HostError, status};
use crate::hostfxr::HostfxrBackend;
use crate::logger::{NamedPipeConnector, PipeLogger};

static HOST: OnceLock<RuntimeHost> = OnceLock::new();

/// The process-wide host behind the exports. There is exactly one per
/// process because the runtime can only be hosted once per process.
pub fn global_host() -> &'static RuntimeHost {
    HOST.get_or_init(|| {
        let config = BridgeConfig::load();
        let logger = PipeLogger::new(NamedPipeConnector)
            .with_tracing_mirror(config.logging.mirror_to_tracing);
        RuntimeHost::new(HostfxrBackend::new(config.runtime), Arc::new(logger))
    })
}

fn guarded(operation: &'static str, body: impl FnOnce() -> Result<(), HostError>) -> i32 {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => status::OK,
        Ok(Err(e)) => {
            tracing::debug!(operation, error = %e, "Returning failure status");
            e.status_code()
        }
        Err(_) => {
            tracing::error!(operation, "Panic caught at ABI boundary");
            status::INTERNAL
        }
    }
}

/// # Safety
///
/// `arguments` must be null or point to a readable `FunctionCallArguments`;
/// `delegate` must be null or point to writable storage for one pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn CreateAssemblyDelegate(
    arguments: *const FunctionCallArguments,
    delegate: *mut *mut c_void,
) -> i32 {
    guarded("CreateAssemblyDelegate", || {
        // SAFETY: upheld by the caller.
        let args = unsafe { arguments.as_ref() }
            .ok_or_else(|| HostError::invalid_argument("arguments", "null pointer"))?;
        if delegate.is_null() {
            return Err(HostError::invalid_argument("delegate", "null out pointer"));
        }
        let handle = global_host().create_delegate(args)?;
        // SAFETY: checked non-null above; writability upheld by the caller.
        unsafe { delegate.write(handle.raw().as_ptr()) };
        Ok(())
    })
}

/// # Safety
///
/// `arguments` must be null or point to a readable `FunctionCallArguments`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ExecuteAssemblyFunction(arguments: *const FunctionCallArguments) -> i32 {
    guarded("ExecuteAssemblyFunction", || {
        // SAFETY: upheld by the caller.
        let args = unsafe { arguments.as_ref() }
            .ok_or_else(|| HostError::invalid_argument("arguments", "null pointer"))?;
        global_host().execute_function(args)
    })
}

/// # Safety
///
/// `arguments` must be null or point to a readable `HostArguments`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn StartCoreRuntime(arguments: *const HostArguments) -> i32 {
    guarded("StartCoreRuntime", || {
        // SAFETY: upheld by the caller.
        let args = unsafe { arguments.as_ref() }
            .ok_or_else(|| HostError::invalid_argument("arguments", "null pointer"))?;
        global_host().start(args)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn UnloadRuntime() -> i32 {
    guarded("UnloadRuntime", || global_host().stop())
}
