// ─── Module Injector ───
// Loads a native module into a running process through a remote thread
// started at the OS loader entry point.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::backend::{InjectorBackend, ProcessHandle, WaitOutcome};
use crate::core::process::{ProcessError, ProcessLocator, ProcessTarget};

pub const DEFAULT_INJECTION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum InjectorError {
    #[error("Module not found: {0:?}")]
    ModuleNotFound(PathBuf),

    #[error("No running process matches {0}")]
    TargetNotFound(String),

    #[error("Failed to query processes: {0}")]
    Locate(#[from] ProcessError),

    #[error("Failed to open process {pid}: {reason}")]
    OpenFailed { pid: u32, reason: String },

    #[error("Module loader entry point unavailable: {0}")]
    LoaderUnavailable(String),

    #[error("Failed to allocate memory in target process: {0}")]
    AllocationFailed(String),

    #[error("Failed to write module path into target process: {0}")]
    WriteFailed(String),

    #[error("Failed to create remote thread: {0}")]
    ThreadCreateFailed(String),

    #[error("Remote thread did not finish within {0:?}")]
    InjectionTimedOut(Duration),

    #[error("Remote thread failed: {0}")]
    ThreadFailed(String),

    #[error("Target process could not load module {0:?}")]
    ModuleLoadFailed(PathBuf),

    #[error("Module injection is not supported on this platform")]
    Unsupported,
}

/// Runs the open → allocate → write → remote-thread → wait sequence.
/// Attempts are never retried.
pub struct Injector<B> {
    backend: B,
    timeout: Duration,
}

impl<B: InjectorBackend> Injector<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            timeout: DEFAULT_INJECTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve `target` through `locator` and inject into the first match.
    /// Returns the pid that received the module.
    pub fn inject<L: ProcessLocator + ?Sized>(
        &self,
        locator: &mut L,
        target: &ProcessTarget,
        module: &Path,
    ) -> Result<u32, InjectorError> {
        let module = resolve_module(module)?;
        let found = locator
            .resolve(target)?
            .ok_or_else(|| InjectorError::TargetNotFound(target.to_string()))?;
        self.inject_resolved(found.pid, &module)?;
        Ok(found.pid)
    }

    pub fn inject_pid(&self, pid: u32, module: &Path) -> Result<(), InjectorError> {
        let module = resolve_module(module)?;
        self.inject_resolved(pid, &module)
    }

    fn inject_resolved(&self, pid: u32, module: &Path) -> Result<(), InjectorError> {
        info!("Injecting {} into pid {}", module.display(), pid);

        // The handle closes when `process` drops, on every return below.
        let mut process = self.backend.open(pid)?;
        let loader = self.backend.loader_entry()?;

        let path_bytes = self.backend.encode_module_path(module);
        let remote_path = process.allocate(path_bytes.len())?;
        debug!(
            "Allocated {} bytes at {:#x} in pid {}",
            path_bytes.len(),
            remote_path,
            process.pid()
        );
        process.write(remote_path, &path_bytes)?;

        let thread = process.spawn_thread(loader, remote_path)?;
        match process.wait_thread(thread, self.timeout) {
            WaitOutcome::Completed { exit_code: 0 } => {
                warn!("Loader returned null for {} in pid {}", module.display(), pid);
                Err(InjectorError::ModuleLoadFailed(module.to_path_buf()))
            }
            WaitOutcome::Completed { .. } => {
                info!("Injected {} into pid {}", module.display(), pid);
                Ok(())
            }
            WaitOutcome::TimedOut => Err(InjectorError::InjectionTimedOut(self.timeout)),
            WaitOutcome::Abandoned => Err(InjectorError::ThreadFailed("wait abandoned".into())),
            WaitOutcome::Failed(reason) => Err(InjectorError::ThreadFailed(reason)),
        }
    }
}

fn resolve_module(module: &Path) -> Result<PathBuf, InjectorError> {
    if !module.is_file() {
        return Err(InjectorError::ModuleNotFound(module.to_path_buf()));
    }
    std::path::absolute(module).map_err(|_| InjectorError::ModuleNotFound(module.to_path_buf()))
}
