//! In-process stand-ins for the hosted runtime and the observer pipe.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use corebridge_host::{
    DelegateTarget, EntryPoint, HostArguments, HostConfig, HostError, HostedRuntime, HostingBackend,
    PipeConnector, PipeLogger, RawDelegate, RuntimeHost,
};
use corebridge_ipc::{LogLevel, LogMessage, read_frames};
use parking_lot::Mutex;

pub const ENTRY_TYPE: &str = "App.Entry, App";
pub const PIPE: &str = r"\\.\pipe\log";

thread_local! {
    static RECEIVED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Payloads received by the fake entry points on this thread, oldest first.
pub fn take_received() -> Vec<String> {
    RECEIVED.with(|r| std::mem::take(&mut *r.borrow_mut()))
}

unsafe fn decode(arg: *const c_void, size: i32) -> String {
    let size = usize::try_from(size).unwrap();
    #[cfg(windows)]
    {
        // SAFETY: the host passes `size` bytes of UTF-16.
        let units = unsafe { std::slice::from_raw_parts(arg.cast::<u16>(), size / 2) };
        String::from_utf16(units).unwrap()
    }
    #[cfg(not(windows))]
    {
        // SAFETY: the host passes `size` bytes of UTF-8.
        let bytes = unsafe { std::slice::from_raw_parts(arg.cast::<u8>(), size) };
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}

unsafe extern "system" fn echo(arg: *const c_void, size: i32) -> i32 {
    // SAFETY: called by the host with a live payload.
    let payload = unsafe { decode(arg, size) };
    RECEIVED.with(|r| r.borrow_mut().push(payload));
    0
}

unsafe extern "system" fn fault(_arg: *const c_void, _size: i32) -> i32 {
    -1
}

#[derive(Clone, Default)]
pub struct Counters {
    pub initializations: Arc<AtomicUsize>,
    pub resolutions: Arc<AtomicUsize>,
    pub shutdowns: Arc<AtomicUsize>,
}

impl Counters {
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

/// Backend whose runtime exposes `App.Entry, App` with `Echo`, `Greet`
/// and `Fail`.
#[derive(Default)]
pub struct FakeBackend {
    pub counters: Counters,
    pub init_failure: Option<String>,
}

impl FakeBackend {
    pub fn failing(reason: &str) -> Self {
        Self {
            init_failure: Some(reason.to_string()),
            ..Self::default()
        }
    }
}

impl HostingBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    fn initialize(&self, _config: &HostConfig) -> Result<Box<dyn HostedRuntime>, HostError> {
        self.counters.initializations.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.init_failure {
            return Err(HostError::InitializationFailed(reason.clone()));
        }
        Ok(Box::new(FakeRuntime {
            counters: self.counters.clone(),
        }))
    }
}

struct FakeRuntime {
    counters: Counters,
}

impl HostedRuntime for FakeRuntime {
    fn resolve(&self, target: &DelegateTarget) -> Result<RawDelegate, HostError> {
        self.counters.resolutions.fetch_add(1, Ordering::SeqCst);
        if target.type_name != ENTRY_TYPE {
            return Err(HostError::TypeNotFound(target.type_name.clone()));
        }
        let entry: EntryPoint = match target.method_name.as_str() {
            "Echo" | "Greet" => echo,
            "Fail" => fault,
            other => return Err(HostError::MethodNotFound(other.to_string())),
        };
        Ok(RawDelegate::from_entry_point(entry))
    }

    fn shutdown(&self) -> Result<(), HostError> {
        self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Pipes kept in memory, one byte buffer per name.
#[derive(Clone, Default)]
pub struct MemoryPipes {
    pipes: Arc<Mutex<HashMap<String, Arc<Mutex<Vec<u8>>>>>>,
}

struct MemoryWriter(Arc<Mutex<Vec<u8>>>);

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl PipeConnector for MemoryPipes {
    fn connect(&self, pipename: &str) -> io::Result<Box<dyn Write + Send>> {
        let buffer = Arc::clone(self.pipes.lock().entry(pipename.to_string()).or_default());
        Ok(Box::new(MemoryWriter(buffer)))
    }
}

impl MemoryPipes {
    pub fn messages(&self, pipename: &str) -> Vec<LogMessage> {
        let Some(buffer) = self.pipes.lock().get(pipename).cloned() else {
            return Vec::new();
        };
        let bytes = buffer.lock().clone();
        read_frames(bytes.as_slice()).map(Result::unwrap).collect()
    }

    pub fn entries(&self, pipename: &str) -> Vec<(LogLevel, String)> {
        self.messages(pipename)
            .into_iter()
            .map(|m| (m.level, m.message))
            .collect()
    }
}

/// Connector for a pipe nobody is listening on.
pub struct NoReader;

impl PipeConnector for NoReader {
    fn connect(&self, _pipename: &str) -> io::Result<Box<dyn Write + Send>> {
        Err(io::Error::new(io::ErrorKind::NotFound, "no reader"))
    }
}

pub struct Harness {
    pub host: RuntimeHost,
    pub pipes: MemoryPipes,
    pub counters: Counters,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_backend(FakeBackend::default())
    }

    pub fn with_backend(backend: FakeBackend) -> Self {
        let pipes = MemoryPipes::default();
        let counters = backend.counters.clone();
        let logger = Arc::new(PipeLogger::new(pipes.clone()).with_tracing_mirror(false));
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.dll"), b"MZ").unwrap();
        Self {
            host: RuntimeHost::new(backend, logger),
            pipes,
            counters,
            dir,
        }
    }

    /// Harness whose host logs through `logger` instead of memory pipes.
    pub fn with_logger(logger: PipeLogger) -> Self {
        let backend = FakeBackend::default();
        let counters = backend.counters.clone();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.dll"), b"MZ").unwrap();
        Self {
            host: RuntimeHost::new(backend, Arc::new(logger)),
            pipes: MemoryPipes::default(),
            counters,
            dir,
        }
    }

    pub fn without_reader() -> Self {
        let backend = FakeBackend::default();
        let counters = backend.counters.clone();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.dll"), b"MZ").unwrap();
        Self {
            host: RuntimeHost::new(backend, Arc::new(PipeLogger::new(NoReader))),
            pipes: MemoryPipes::default(),
            counters,
            dir,
        }
    }

    pub fn assembly(&self) -> PathBuf {
        self.dir.path().join("app.dll")
    }

    pub fn assembly_str(&self) -> String {
        path_str(&self.assembly())
    }

    pub fn host_arguments(&self) -> HostArguments {
        HostArguments::new(&self.assembly_str(), r"C:\runtime\", PIPE).unwrap()
    }

    pub fn start(&self) {
        self.host.start(&self.host_arguments()).unwrap();
    }
}

pub fn path_str(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}
