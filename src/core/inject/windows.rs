// ─── Win32 Injector Backend ───

use std::ffi::c_void;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::time::Duration;

use tracing::warn;
use windows::core::{s, w};
use windows::Win32::Foundation::{
    CloseHandle, HANDLE, WAIT_ABANDONED, WAIT_FAILED, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows::Win32::System::Diagnostics::Debug::WriteProcessMemory;
use windows::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};
use windows::Win32::System::Memory::{VirtualAllocEx, MEM_COMMIT, MEM_RESERVE, PAGE_READWRITE};
use windows::Win32::System::Threading::{
    CreateRemoteThread, GetExitCodeThread, OpenProcess, WaitForSingleObject,
    LPTHREAD_START_ROUTINE, PROCESS_CREATE_THREAD, PROCESS_QUERY_INFORMATION,
    PROCESS_VM_OPERATION, PROCESS_VM_READ, PROCESS_VM_WRITE,
};

use super::backend::{InjectorBackend, ProcessHandle, RemoteAddress, ThreadToken, WaitOutcome};
use super::injector::InjectorError;

/// `kernel32!LoadLibraryW` through a remote thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsBackend;

pub struct WindowsProcess {
    pid: u32,
    handle: HANDLE,
    threads: Vec<HANDLE>,
}

impl Drop for WindowsProcess {
    fn drop(&mut self) {
        for thread in self.threads.drain(..) {
            if let Err(e) = unsafe { CloseHandle(thread) } {
                warn!("CloseHandle(thread) failed: {e}");
            }
        }
        if let Err(e) = unsafe { CloseHandle(self.handle) } {
            warn!("CloseHandle(process {}) failed: {e}", self.pid);
        }
    }
}

impl ProcessHandle for WindowsProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn allocate(&mut self, len: usize) -> Result<RemoteAddress, InjectorError> {
        let address = unsafe {
            VirtualAllocEx(self.handle, None, len, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE)
        };
        if address.is_null() {
            return Err(InjectorError::AllocationFailed(
                std::io::Error::last_os_error().to_string(),
            ));
        }
        Ok(address as RemoteAddress)
    }

    fn write(&mut self, address: RemoteAddress, bytes: &[u8]) -> Result<(), InjectorError> {
        let mut written = 0usize;
        unsafe {
            WriteProcessMemory(
                self.handle,
                address as *const c_void,
                bytes.as_ptr() as *const c_void,
                bytes.len(),
                Some(&mut written as *mut usize),
            )
        }
        .map_err(|e| InjectorError::WriteFailed(e.to_string()))?;

        if written != bytes.len() {
            return Err(InjectorError::WriteFailed(format!(
                "wrote {written} of {} bytes",
                bytes.len()
            )));
        }
        Ok(())
    }

    fn spawn_thread(
        &mut self,
        entry: RemoteAddress,
        argument: RemoteAddress,
    ) -> Result<ThreadToken, InjectorError> {
        // SAFETY: `entry` is the address of LoadLibraryW, whose signature is
        // compatible with a thread start routine.
        let start: LPTHREAD_START_ROUTINE = unsafe { std::mem::transmute(entry) };
        let thread = unsafe {
            CreateRemoteThread(
                self.handle,
                None,
                0,
                start,
                Some(argument as *const c_void),
                0,
                None,
            )
        }
        .map_err(|e| InjectorError::ThreadCreateFailed(e.to_string()))?;

        self.threads.push(thread);
        Ok(ThreadToken(self.threads.len() - 1))
    }

    fn wait_thread(&mut self, thread: ThreadToken, timeout: Duration) -> WaitOutcome {
        let Some(&handle) = self.threads.get(thread.0) else {
            return WaitOutcome::Failed(format!("unknown thread token {}", thread.0));
        };

        let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        let result = unsafe { WaitForSingleObject(handle, millis) };
        if result == WAIT_TIMEOUT {
            return WaitOutcome::TimedOut;
        }
        if result == WAIT_ABANDONED {
            return WaitOutcome::Abandoned;
        }
        if result == WAIT_FAILED || result != WAIT_OBJECT_0 {
            return WaitOutcome::Failed(std::io::Error::last_os_error().to_string());
        }

        let mut exit_code = 0u32;
        match unsafe { GetExitCodeThread(handle, &mut exit_code) } {
            Ok(()) => WaitOutcome::Completed { exit_code },
            Err(e) => WaitOutcome::Failed(e.to_string()),
        }
    }
}

impl InjectorBackend for WindowsBackend {
    type Handle = WindowsProcess;

    fn open(&self, pid: u32) -> Result<WindowsProcess, InjectorError> {
        let rights = PROCESS_CREATE_THREAD
            | PROCESS_QUERY_INFORMATION
            | PROCESS_VM_OPERATION
            | PROCESS_VM_WRITE
            | PROCESS_VM_READ;
        let handle = unsafe { OpenProcess(rights, false, pid) }.map_err(|e| {
            InjectorError::OpenFailed {
                pid,
                reason: e.to_string(),
            }
        })?;
        Ok(WindowsProcess {
            pid,
            handle,
            threads: Vec::new(),
        })
    }

    fn loader_entry(&self) -> Result<RemoteAddress, InjectorError> {
        // kernel32 is mapped at the same base in every process of a session.
        let kernel32 = unsafe { GetModuleHandleW(w!("kernel32.dll")) }
            .map_err(|e| InjectorError::LoaderUnavailable(e.to_string()))?;
        let load_library = unsafe { GetProcAddress(kernel32, s!("LoadLibraryW")) }
            .ok_or_else(|| InjectorError::LoaderUnavailable("LoadLibraryW not exported".into()))?;
        Ok(load_library as RemoteAddress)
    }

    fn encode_module_path(&self, path: &Path) -> Vec<u8> {
        path.as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .flat_map(u16::to_le_bytes)
            .collect()
    }
}
