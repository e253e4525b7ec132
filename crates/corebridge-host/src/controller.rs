use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::args::{HostArguments, HostConfig};
use crate::backend::{HostedRuntime, HostingBackend};
use crate::error::HostError;
use crate::logger::PipeLogger;

/// Observable lifecycle state of a [`RuntimeHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Uninitialized,
    Started,
    Stopped,
}

/// One hosting session: the runtime brought up by a successful start.
pub(crate) struct Session {
    pub(crate) config: HostConfig,
    pub(crate) runtime: Box<dyn HostedRuntime>,
    live: AtomicBool,
}

impl Session {
    pub(crate) fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

enum HostState {
    Uninitialized,
    Started(Arc<Session>),
    Stopped,
}

/// Owner of the hosted runtime.
///
/// The lifecycle is `Uninitialized → Started → Stopped` with no way back:
/// the managed runtime can be brought up only once per process. A start that
/// fails inside the backend also ends in `Stopped`.
///
/// `start` and `stop` are expected to be serialized by the caller. Resolution
/// and invocation may run concurrently once started; they only hold the state
/// lock long enough to clone the session.
pub struct RuntimeHost {
    backend: Box<dyn HostingBackend>,
    logger: Arc<PipeLogger>,
    state: Mutex<HostState>,
}

impl RuntimeHost {
    pub fn new(backend: impl HostingBackend + 'static, logger: Arc<PipeLogger>) -> Self {
        Self {
            backend: Box::new(backend),
            logger,
            state: Mutex::new(HostState::Uninitialized),
        }
    }

    pub fn logger(&self) -> &PipeLogger {
        &self.logger
    }

    pub fn status(&self) -> HostStatus {
        match &*self.state.lock() {
            HostState::Uninitialized => HostStatus::Uninitialized,
            HostState::Started(_) => HostStatus::Started,
            HostState::Stopped => HostStatus::Stopped,
        }
    }

    /// Validate the ABI arguments and start the runtime.
    pub fn start(&self, args: &HostArguments) -> Result<(), HostError> {
        match args.validate() {
            Ok(config) => self.start_with(config),
            Err(e) => {
                if let Some(pipename) = args.pipename() {
                    self.logger.error(&pipename, format!("Invalid host arguments: {e}"));
                }
                Err(e)
            }
        }
    }

    pub fn start_with(&self, config: HostConfig) -> Result<(), HostError> {
        let mut state = self.state.lock();
        let refused = match &*state {
            HostState::Uninitialized => None,
            HostState::Started(_) => Some(HostError::AlreadyStarted),
            HostState::Stopped => Some(HostError::AlreadyShutdown),
        };
        if let Some(e) = refused {
            self.logger.error(&config.pipename, format!("Cannot start runtime: {e}"));
            return Err(e);
        }

        tracing::info!(
            backend = self.backend.name(),
            core_root = %config.core_root_path.display(),
            assembly = %config.assembly_file_path.display(),
            "Starting hosted runtime"
        );

        match self.backend.initialize(&config) {
            Ok(runtime) => {
                self.logger.info(
                    &config.pipename,
                    format!(
                        "Runtime started from {} for {}",
                        config.core_root_path.display(),
                        config.assembly_file_path.display()
                    ),
                );
                *state = HostState::Started(Arc::new(Session {
                    config,
                    runtime,
                    live: AtomicBool::new(true),
                }));
                Ok(())
            }
            Err(e) => {
                *state = HostState::Stopped;
                self.logger.error(&config.pipename, format!("Failed to start runtime: {e}"));
                Err(e)
            }
        }
    }

    /// Release the runtime. Always ends in `Stopped` when a session existed;
    /// backend shutdown problems are logged rather than returned.
    pub fn stop(&self) -> Result<(), HostError> {
        let session = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, HostState::Stopped) {
                HostState::Started(session) => session,
                previous => {
                    *state = previous;
                    return Err(HostError::NotStarted);
                }
            }
        };

        session.live.store(false, Ordering::Release);
        let pipename = &session.config.pipename;
        if let Err(e) = session.runtime.shutdown() {
            self.logger.error(pipename, format!("Runtime shutdown reported: {e}"));
        }
        self.logger.info(pipename, "Runtime unloaded");
        self.logger.disconnect_all();
        Ok(())
    }

    pub(crate) fn session(&self) -> Result<Arc<Session>, HostError> {
        match &*self.state.lock() {
            HostState::Started(session) => Ok(Arc::clone(session)),
            _ => Err(HostError::NotStarted),
        }
    }
}
