//! Production backend: the .NET runtime brought up through hostfxr.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use netcorehost::hostfxr::{
    DelegateLoader, GetManagedFunctionError, Hostfxr, HostfxrContext, InitializedForRuntimeConfig,
};
use netcorehost::nethost;
use netcorehost::pdcstring::PdCString;
use serde::Deserialize;

use crate::args::HostConfig;
use crate::backend::{DelegateTarget, HostedRuntime, HostingBackend, RawDelegate};
use crate::config::RuntimeSettings;
use crate::error::HostError;

const ROOT_RUNTIME_CONFIG: &str = "dotnet.runtimeconfig.json";

/// Rust-side shape of the component entry point every delegate is bound as.
type ComponentEntryPoint = fn(*const c_void, i32) -> i32;

fn init_error(what: &str, e: impl std::fmt::Display) -> HostError {
    HostError::InitializationFailed(format!("{what}: {e}"))
}

fn pd_path(path: &Path) -> Result<PdCString, HostError> {
    PdCString::from_os_str(path.as_os_str())
        .map_err(|e| init_error(&format!("cannot encode {}", path.display()), e))
}

fn pd_name(field: &'static str, value: &str) -> Result<PdCString, HostError> {
    PdCString::from_os_str(value).map_err(|e| HostError::invalid_argument(field, e))
}

/// Brings up the .NET runtime with hostfxr from the core root.
pub struct HostfxrBackend {
    settings: RuntimeSettings,
}

impl HostfxrBackend {
    pub fn new(settings: RuntimeSettings) -> Self {
        Self { settings }
    }

    fn load_hostfxr(&self, core_root: &Path) -> Result<Hostfxr, HostError> {
        match &self.settings.hostfxr_path {
            Some(path) => {
                if !path.is_file() {
                    return Err(HostError::InitializationFailed(format!(
                        "{} does not exist",
                        path.display()
                    )));
                }
                Hostfxr::load_from_path(pd_path(path)?.to_os_string())
                    .map_err(|e| init_error(&format!("cannot load {}", path.display()), e))
            }
            None => nethost::load_hostfxr_with_dotnet_root(pd_path(core_root)?).map_err(|e| {
                init_error(&format!("hostfxr not found under {}", core_root.display()), e)
            }),
        }
    }
}

impl Default for HostfxrBackend {
    fn default() -> Self {
        Self::new(RuntimeSettings::default())
    }
}

impl HostingBackend for HostfxrBackend {
    fn name(&self) -> &str {
        "hostfxr"
    }

    fn initialize(&self, config: &HostConfig) -> Result<Box<dyn HostedRuntime>, HostError> {
        if !config.core_root_path.is_dir() {
            return Err(HostError::InitializationFailed(format!(
                "core root {} does not exist",
                config.core_root_path.display()
            )));
        }

        let runtime_config = match &self.settings.runtime_config {
            Some(path) => path.clone(),
            None => find_runtime_config(config).ok_or_else(|| {
                HostError::InitializationFailed(format!(
                    "no runtimeconfig.json next to {} or in {}",
                    config.assembly_file_path.display(),
                    config.core_root_path.display()
                ))
            })?,
        };
        let parsed = RuntimeConfigFile::read(&runtime_config)?;

        tracing::debug!(
            core_root = %config.core_root_path.display(),
            runtime_config = %runtime_config.display(),
            frameworks = ?parsed.frameworks(),
            "Loading hostfxr"
        );

        let hostfxr = self.load_hostfxr(&config.core_root_path)?;
        let context = hostfxr
            .initialize_for_runtime_config(pd_path(&runtime_config)?)
            .map_err(|e| init_error("hostfxr_initialize_for_runtime_config", e))?;
        let loader = context
            .get_delegate_loader()
            .map_err(|e| init_error("hostfxr_get_runtime_delegate", e))?;

        Ok(Box::new(HostfxrRuntime {
            _hostfxr: ManuallyDrop::new(hostfxr),
            _context: context,
            loader,
            closed: AtomicBool::new(false),
        }))
    }
}

fn find_runtime_config(config: &HostConfig) -> Option<PathBuf> {
    let beside_assembly = config.assembly_file_path.with_extension("runtimeconfig.json");
    if beside_assembly.is_file() {
        return Some(beside_assembly);
    }
    let in_root = config.core_root_path.join(ROOT_RUNTIME_CONFIG);
    in_root.is_file().then_some(in_root)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeConfigFile {
    runtime_options: RuntimeOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeOptions {
    #[serde(default)]
    framework: Option<FrameworkReference>,
    #[serde(default)]
    frameworks: Vec<FrameworkReference>,
    #[serde(default)]
    included_frameworks: Vec<FrameworkReference>,
}

#[derive(Debug, Deserialize)]
struct FrameworkReference {
    name: String,
    version: String,
}

impl RuntimeConfigFile {
    fn read(path: &Path) -> Result<Self, HostError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HostError::InitializationFailed(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&content).map_err(|reason| {
            HostError::InitializationFailed(format!(
                "corrupt configuration {}: {reason}",
                path.display()
            ))
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        let file: Self = serde_json::from_str(content).map_err(|e| e.to_string())?;
        if file.frameworks().is_empty() {
            return Err("runtimeOptions names no framework".into());
        }
        Ok(file)
    }

    fn frameworks(&self) -> Vec<String> {
        let options = &self.runtime_options;
        options
            .framework
            .iter()
            .chain(&options.frameworks)
            .chain(&options.included_frameworks)
            .map(|f| format!("{}@{}", f.name, f.version))
            .collect()
    }
}

struct HostfxrRuntime {
    // The CLR cannot be unloaded from a process, so hostfxr stays mapped.
    _hostfxr: ManuallyDrop<Hostfxr>,
    _context: HostfxrContext<InitializedForRuntimeConfig>,
    loader: DelegateLoader,
    closed: AtomicBool,
}

// SAFETY: the context and loader are plain handles into hostfxr, whose
// delegate loader may be called from any thread.
unsafe impl Send for HostfxrRuntime {}
unsafe impl Sync for HostfxrRuntime {}

impl HostedRuntime for HostfxrRuntime {
    fn resolve(&self, target: &DelegateTarget) -> Result<RawDelegate, HostError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HostError::NotStarted);
        }

        let assembly = PdCString::from_os_str(target.assembly_path.as_os_str())
            .map_err(|e| HostError::invalid_argument("assembly_path", e))?;
        let type_name = pd_name("type_name_qualified", &target.type_name)?;
        let method_name = pd_name("method_name", &target.method_name)?;

        let function = match &target.delegate_type_name {
            Some(delegate_type) => {
                let delegate_type = pd_name("delegate_type_name", delegate_type)?;
                self.loader.load_assembly_and_get_function::<ComponentEntryPoint>(
                    &assembly,
                    &type_name,
                    &method_name,
                    &delegate_type,
                )
            }
            None => self
                .loader
                .load_assembly_and_get_function_with_unmanaged_callers_only::<ComponentEntryPoint>(
                    &assembly,
                    &type_name,
                    &method_name,
                ),
        }
        .map_err(|e| resolution_error(e, target))?;

        Ok(RawDelegate::from_entry_point(*function))
    }

    fn shutdown(&self) -> Result<(), HostError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Map a failed function pointer lookup to an error. The runtime reports a
/// missing type and a missing method with the same code.
pub fn resolution_error(error: GetManagedFunctionError, target: &DelegateTarget) -> HostError {
    match error {
        GetManagedFunctionError::AssemblyNotFound => {
            HostError::AssemblyNotFound(target.assembly_path.display().to_string())
        }
        GetManagedFunctionError::TypeOrMethodNotFound => {
            HostError::MethodNotFound(format!("{target} (type or method not found)"))
        }
        other => HostError::ResolutionFailed(format!("{target}: {other}")),
    }
}
