pub mod backend;
pub mod injector;
#[cfg(windows)]
pub mod windows;

pub use backend::{InjectorBackend, ProcessHandle, RemoteAddress, ThreadToken, WaitOutcome};
pub use injector::{Injector, InjectorError, DEFAULT_INJECTION_TIMEOUT};

#[cfg(windows)]
pub type PlatformBackend = windows::WindowsBackend;
#[cfg(not(windows))]
pub type PlatformBackend = backend::UnsupportedBackend;

/// Injector wired to the native backend for this OS.
pub fn platform_injector() -> Injector<PlatformBackend> {
    Injector::new(PlatformBackend::default())
}
