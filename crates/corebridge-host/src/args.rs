//! The two fixed-layout argument structs of the C ABI and their validated,
//! owned counterparts.

use std::path::PathBuf;

use widestring::{U16CStr, U16CString};

use crate::backend::DelegateTarget;
use crate::error::HostError;
use crate::marshal::{MarshalError, WideBuf};

pub const MAX_PATH: usize = 260;
pub const MAX_NAME: usize = 256;
pub const MAX_PAYLOAD: usize = 1024;

/// Arguments for `StartCoreRuntime`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct HostArguments {
    pub assembly_file_path: WideBuf<MAX_PATH>,
    pub core_root_path: WideBuf<MAX_PATH>,
    pub pipename: WideBuf<MAX_PATH>,
}

/// Owned copy of [`HostArguments`] after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub assembly_file_path: PathBuf,
    pub core_root_path: PathBuf,
    pub pipename: String,
}

impl HostArguments {
    pub fn new(
        assembly_file_path: &str,
        core_root_path: &str,
        pipename: &str,
    ) -> Result<Self, MarshalError> {
        Ok(Self {
            assembly_file_path: WideBuf::encode(assembly_file_path)?,
            core_root_path: WideBuf::encode(core_root_path)?,
            pipename: WideBuf::encode(pipename)?,
        })
    }

    /// The pipe name, if it is well formed. Used to report validation errors.
    pub fn pipename(&self) -> Option<String> {
        optional_text("pipename", &self.pipename).ok()
    }

    pub fn validate(&self) -> Result<HostConfig, HostError> {
        Ok(HostConfig {
            pipename: optional_text("pipename", &self.pipename)?,
            assembly_file_path: required_path("assembly_file_path", &self.assembly_file_path)?,
            core_root_path: required_path("core_root_path", &self.core_root_path)?,
        })
    }
}

/// Arguments for `CreateAssemblyDelegate` and `ExecuteAssemblyFunction`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionCallArguments {
    pub assembly_path: WideBuf<MAX_NAME>,
    pub type_name_qualified: WideBuf<MAX_NAME>,
    pub method_name: WideBuf<MAX_NAME>,
    pub delegate_type_name: WideBuf<MAX_NAME>,
    pub pipename: WideBuf<MAX_PATH>,
    pub payload: WideBuf<MAX_PAYLOAD>,
}

/// Owned copy of [`FunctionCallArguments`] after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub target: DelegateTarget,
    pub pipename: String,
    pub payload: U16CString,
}

impl FunctionCallArguments {
    pub fn new(
        assembly_path: &str,
        type_name_qualified: &str,
        method_name: &str,
    ) -> Result<Self, MarshalError> {
        Ok(Self {
            assembly_path: WideBuf::encode(assembly_path)?,
            type_name_qualified: WideBuf::encode(type_name_qualified)?,
            method_name: WideBuf::encode(method_name)?,
            ..Self::default()
        })
    }

    pub fn with_delegate_type(mut self, delegate_type_name: &str) -> Result<Self, MarshalError> {
        self.delegate_type_name = WideBuf::encode(delegate_type_name)?;
        Ok(self)
    }

    pub fn with_pipename(mut self, pipename: &str) -> Result<Self, MarshalError> {
        self.pipename = WideBuf::encode(pipename)?;
        Ok(self)
    }

    pub fn with_payload(mut self, payload: &str) -> Result<Self, MarshalError> {
        self.payload = WideBuf::encode(payload)?;
        Ok(self)
    }

    pub fn pipename(&self) -> Option<String> {
        optional_text("pipename", &self.pipename).ok()
    }

    /// Check every field before anything is resolved. A field without a
    /// terminator inside its capacity fails here, never later.
    pub fn validate(&self) -> Result<FunctionCall, HostError> {
        let pipename = optional_text("pipename", &self.pipename)?;
        let assembly_path = required_path("assembly_path", &self.assembly_path)?;
        let type_name = required_text("type_name_qualified", &self.type_name_qualified)?;
        let method_name = required_text("method_name", &self.method_name)?;
        let delegate_type_name = optional_text("delegate_type_name", &self.delegate_type_name)?;
        let payload = terminated("payload", &self.payload)?.to_ucstring();

        Ok(FunctionCall {
            target: DelegateTarget {
                assembly_path,
                type_name,
                method_name,
                delegate_type_name: (!delegate_type_name.is_empty()).then_some(delegate_type_name),
            },
            pipename,
            payload,
        })
    }
}

fn terminated<'a, const N: usize>(
    field: &'static str,
    buf: &'a WideBuf<N>,
) -> Result<&'a U16CStr, HostError> {
    buf.as_u16cstr()
        .map_err(|e| HostError::invalid_argument(field, e))
}

fn optional_text<const N: usize>(field: &'static str, buf: &WideBuf<N>) -> Result<String, HostError> {
    terminated(field, buf)?
        .to_string()
        .map_err(|e| HostError::invalid_argument(field, e))
}

fn required_text<const N: usize>(field: &'static str, buf: &WideBuf<N>) -> Result<String, HostError> {
    let text = optional_text(field, buf)?;
    if text.is_empty() {
        return Err(HostError::invalid_argument(field, "must not be empty"));
    }
    Ok(text)
}

fn required_path<const N: usize>(field: &'static str, buf: &WideBuf<N>) -> Result<PathBuf, HostError> {
    #[cfg(windows)]
    {
        let value = terminated(field, buf)?;
        if value.is_empty() {
            return Err(HostError::invalid_argument(field, "must not be empty"));
        }
        Ok(PathBuf::from(value.to_os_string()))
    }
    #[cfg(not(windows))]
    {
        required_text(field, buf).map(PathBuf::from)
    }
}
