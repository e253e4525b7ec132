use std::fmt;
use std::sync::{Arc, Weak};

use crate::args::FunctionCallArguments;
use crate::backend::{DelegateTarget, RawDelegate};
use crate::controller::{RuntimeHost, Session};
use crate::error::HostError;

/// A resolved managed entry point.
///
/// Opaque to callers: it can only be run through [`RuntimeHost::invoke`], and
/// only while the session that resolved it is still running.
#[derive(Clone)]
pub struct DelegateHandle {
    raw: RawDelegate,
    session: Weak<Session>,
    label: String,
}

impl DelegateHandle {
    /// `Type::Method` this handle is bound to.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the session that produced this handle is still running.
    pub fn is_live(&self) -> bool {
        self.session.upgrade().is_some_and(|s| s.is_live())
    }

    pub(crate) fn raw(&self) -> RawDelegate {
        self.raw
    }

    pub(crate) fn belongs_to(&self, session: &Arc<Session>) -> bool {
        std::ptr::eq(self.session.as_ptr(), Arc::as_ptr(session))
    }
}

impl fmt::Debug for DelegateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateHandle")
            .field("label", &self.label)
            .field("live", &self.is_live())
            .finish()
    }
}

impl RuntimeHost {
    /// Resolve the entry point described by `args`, logging the outcome to
    /// the pipe named in them.
    pub fn create_delegate(&self, args: &FunctionCallArguments) -> Result<DelegateHandle, HostError> {
        let pipename = args.pipename().unwrap_or_default();
        let result = args.validate().and_then(|call| self.resolve(&call.target));

        match &result {
            Ok(handle) => self
                .logger()
                .info(&pipename, format!("Created delegate for {}", handle.label())),
            Err(e) => self
                .logger()
                .error(&pipename, format!("Failed to create delegate: {e}")),
        }
        result
    }

    /// Resolve an already validated target. Does not log to any pipe.
    pub fn resolve(&self, target: &DelegateTarget) -> Result<DelegateHandle, HostError> {
        let session = self.session()?;

        if !target.assembly_path.is_file() {
            return Err(HostError::AssemblyNotFound(
                target.assembly_path.display().to_string(),
            ));
        }

        tracing::debug!(
            assembly = %target.assembly_path.display(),
            type_name = %target.type_name,
            method = %target.method_name,
            "Resolving delegate"
        );
        let raw = session.runtime.resolve(target)?;

        Ok(DelegateHandle {
            raw,
            session: Arc::downgrade(&session),
            label: target.to_string(),
        })
    }
}
