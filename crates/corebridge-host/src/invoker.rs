use widestring::U16CStr;

use crate::args::FunctionCallArguments;
use crate::controller::RuntimeHost;
use crate::error::HostError;
use crate::marshal::RuntimeString;
use crate::resolver::DelegateHandle;

impl RuntimeHost {
    /// Resolve and call the entry point described by `args` with its payload.
    ///
    /// A failure inside the managed call leaves the runtime in an unknown
    /// state; callers should stop hosting rather than keep calling.
    pub fn execute_function(&self, args: &FunctionCallArguments) -> Result<(), HostError> {
        let pipename = args.pipename().unwrap_or_default();
        let result = args.validate().and_then(|call| {
            let handle = self.resolve(&call.target)?;
            self.invoke(&handle, &call.payload)?;
            Ok(handle)
        });

        match &result {
            Ok(handle) => self
                .logger()
                .info(&pipename, format!("Executed {}: success", handle.label())),
            Err(e) => self
                .logger()
                .error(&pipename, format!("Failed to execute assembly function: {e}")),
        }
        result.map(|_| ())
    }

    /// Call a resolved entry point with one string argument.
    pub fn invoke(&self, handle: &DelegateHandle, payload: &U16CStr) -> Result<(), HostError> {
        let session = self.session()?;
        if !session.is_live() || !handle.belongs_to(&session) {
            return Err(HostError::NotStarted);
        }

        let payload = RuntimeString::from_wide(payload)?;
        let size = i32::try_from(payload.byte_len())
            .map_err(|_| HostError::invalid_argument("payload", "larger than i32::MAX bytes"))?;

        tracing::debug!(delegate = handle.label(), bytes = size, "Invoking delegate");

        // SAFETY: the handle was resolved by this session, which is still
        // running, and every entry point is called with the component entry
        // point signature. `payload` outlives the call.
        let status = unsafe {
            let entry = handle.raw().entry_point();
            entry(payload.as_ptr().cast(), size)
        };

        if status != 0 {
            return Err(HostError::ManagedInvocationFailed(format!(
                "{} returned status {status}",
                handle.label()
            )));
        }
        Ok(())
    }
}
