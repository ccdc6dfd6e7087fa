//! Live process memory via `process_vm_readv(2)`

#![allow(unsafe_code)] // process_vm_readv requires unsafe

use super::{memory_maps, RemoteMemory};
use crate::domain::{Pid, ReadError, ScopeError};
use std::path::Path;

/// Read-only handle on a running process
///
/// Holds no OS resources: every read is a single `process_vm_readv` call, so
/// the handle stays valid (and reads simply fail) if the target exits.
#[derive(Debug, Clone)]
pub struct ProcessMemory {
    pid: Pid,
}

impl ProcessMemory {
    /// Attach to `pid`
    ///
    /// # Errors
    /// Returns `ProcessNotFound` if `/proc/<pid>` does not exist
    pub fn attach(pid: Pid) -> Result<Self, ScopeError> {
        if !Path::new(&format!("/proc/{}", pid.0)).exists() {
            return Err(ScopeError::ProcessNotFound(pid));
        }
        Ok(Self { pid })
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        self.pid
    }
}

impl RemoteMemory for ProcessMemory {
    fn read_bytes(&self, addr: u64, buf: &mut [u8]) -> Result<(), ReadError> {
        let got = self.read_bytes_prefix(addr, buf)?;
        if got != buf.len() {
            return Err(ReadError::ShortRead { addr, expected: buf.len(), got });
        }
        Ok(())
    }

    /// The kernel stops a `process_vm_readv` transfer at the first
    /// unreadable page and reports how far it got.
    fn read_bytes_prefix(&self, addr: u64, buf: &mut [u8]) -> Result<usize, ReadError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let len = buf.len();
        let remote_base = usize::try_from(addr).map_err(|_| ReadError::BadAddress { addr, len })?;

        let local_iov = libc::iovec { iov_base: buf.as_mut_ptr().cast::<libc::c_void>(), iov_len: len };
        let remote_iov = libc::iovec { iov_base: remote_base as *mut libc::c_void, iov_len: len };

        // SAFETY: local_iov covers exactly `buf`, which we borrow mutably for
        // the duration of the call. The remote side is validated by the kernel.
        let r = unsafe { libc::process_vm_readv(self.pid.0, &local_iov, 1, &remote_iov, 1, 0) };

        if r < 0 {
            let err = std::io::Error::last_os_error();
            return Err(match err.raw_os_error() {
                Some(libc::EFAULT) => ReadError::BadAddress { addr, len },
                _ => ReadError::Os { addr, source: err },
            });
        }

        #[allow(clippy::cast_sign_loss)] // r >= 0 checked above
        let got = r as usize;
        if got == 0 {
            return Err(ReadError::BadAddress { addr, len });
        }
        Ok(got)
    }

    fn module_base(&self, module: &str) -> Result<u64, ReadError> {
        memory_maps::module_range(self.pid, module).map(|range| range.start)
    }
}
