use std::ffi::c_void;
use std::fmt;
use std::path::PathBuf;

use crate::args::HostConfig;
use crate::error::HostError;

/// Shape every entry point is invoked with: the hostfxr component entry
/// point, `int (void* arg, int32 arg_size_in_bytes)`.
pub type EntryPoint = unsafe extern "system" fn(arg: *const c_void, arg_size_in_bytes: i32) -> i32;

/// The managed method a delegate is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateTarget {
    pub assembly_path: PathBuf,
    /// Assembly-qualified type name, e.g. `App.Entry, App`.
    pub type_name: String,
    pub method_name: String,
    /// `None` binds an `[UnmanagedCallersOnly]` method.
    pub delegate_type_name: Option<String>,
}

impl fmt::Display for DelegateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.type_name, self.method_name)
    }
}

/// A managed entry point handed out by the runtime, bound as [`EntryPoint`].
#[derive(Debug, Clone, Copy)]
pub struct RawDelegate(EntryPoint);

impl RawDelegate {
    pub fn from_entry_point(entry: EntryPoint) -> Self {
        Self(entry)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    pub(crate) fn entry_point(self) -> EntryPoint {
        self.0
    }
}

/// Something that can bring up a managed runtime inside this process.
pub trait HostingBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    fn initialize(&self, config: &HostConfig) -> Result<Box<dyn HostedRuntime>, HostError>;
}

/// A runtime brought up by a [`HostingBackend`].
///
/// No locking is added around these calls: concurrent resolution is sound
/// exactly when the underlying runtime says it is.
pub trait HostedRuntime: Send + Sync {
    fn resolve(&self, target: &DelegateTarget) -> Result<RawDelegate, HostError>;

    fn shutdown(&self) -> Result<(), HostError>;
}
