// ─── Injector Backend ───
// Capability traits over the OS primitives a module injection needs.

use std::path::Path;
use std::time::Duration;

use super::injector::InjectorError;

/// Address inside the target process.
pub type RemoteAddress = usize;

/// Opaque reference to a thread created by `ProcessHandle::spawn_thread`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadToken(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The thread ran to completion with this exit code.
    Completed { exit_code: u32 },
    TimedOut,
    Abandoned,
    Failed(String),
}

/// An opened target process.
///
/// Implementors release the OS handle (and any thread handles they created)
/// in `Drop`, so dropping the value is the one and only close.
pub trait ProcessHandle {
    fn pid(&self) -> u32;

    /// Reserve a read-write region of `len` bytes in the target.
    fn allocate(&mut self, len: usize) -> Result<RemoteAddress, InjectorError>;

    fn write(&mut self, address: RemoteAddress, bytes: &[u8]) -> Result<(), InjectorError>;

    /// Start a thread in the target at `entry` with `argument` as its
    /// only parameter.
    fn spawn_thread(
        &mut self,
        entry: RemoteAddress,
        argument: RemoteAddress,
    ) -> Result<ThreadToken, InjectorError>;

    fn wait_thread(&mut self, thread: ThreadToken, timeout: Duration) -> WaitOutcome;
}

pub trait InjectorBackend {
    type Handle: ProcessHandle;

    /// Open `pid` with rights to create threads, query it, and operate
    /// on, write and read its memory.
    fn open(&self, pid: u32) -> Result<Self::Handle, InjectorError>;

    /// Address of the OS module loader routine, valid in the target.
    fn loader_entry(&self) -> Result<RemoteAddress, InjectorError>;

    /// Bytes the loader expects for `path`, terminator included.
    fn encode_module_path(&self, path: &Path) -> Vec<u8>;
}

/// Backend for platforms without remote thread injection.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

/// Never constructed; `UnsupportedBackend::open` always fails.
#[derive(Debug)]
pub enum NoHandle {}

impl ProcessHandle for NoHandle {
    fn pid(&self) -> u32 {
        match *self {}
    }

    fn allocate(&mut self, _len: usize) -> Result<RemoteAddress, InjectorError> {
        match *self {}
    }

    fn write(&mut self, _address: RemoteAddress, _bytes: &[u8]) -> Result<(), InjectorError> {
        match *self {}
    }

    fn spawn_thread(
        &mut self,
        _entry: RemoteAddress,
        _argument: RemoteAddress,
    ) -> Result<ThreadToken, InjectorError> {
        match *self {}
    }

    fn wait_thread(&mut self, _thread: ThreadToken, _timeout: Duration) -> WaitOutcome {
        match *self {}
    }
}

impl InjectorBackend for UnsupportedBackend {
    type Handle = NoHandle;

    fn open(&self, _pid: u32) -> Result<Self::Handle, InjectorError> {
        Err(InjectorError::Unsupported)
    }

    fn loader_entry(&self) -> Result<RemoteAddress, InjectorError> {
        Err(InjectorError::Unsupported)
    }

    fn encode_module_path(&self, path: &Path) -> Vec<u8> {
        let mut bytes = path.to_string_lossy().into_owned().into_bytes();
        bytes.push(0);
        bytes
    }
}
