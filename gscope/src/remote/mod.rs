//! # Remote Memory Access
//!
//! gscope never runs code inside the target. Everything it knows comes from
//! copying bytes out of the target's address space, so the whole engine is
//! written against one small trait:
//!
//! - [`RemoteMemory::read_bytes`]: copy a contiguous range, all or nothing
//! - [`RemoteMemory::module_base`]: load address of a named module
//!
//! Typed access ([`RemoteMemory::read_records`]) is layered on top and only
//! accepts [`Pod`] records from `gscope-common`, whose layouts are pinned at
//! compile time.
//!
//! ## Failure Contract
//!
//! The target keeps running while we read it. Any read may fail because a
//! buffer was freed, resized or unmapped between two reads. Every consumer in
//! this crate handles `Err` as "item absent" and moves on; a read failure is
//! never fatal to a scan.
//!
//! Reads are all or nothing, with one exception: the variable arena is read
//! with a fixed over-sized capacity, so [`RemoteMemory::read_records_prefix`]
//! keeps whatever leading records were readable.
//!
//! ## Implementations
//!
//! - [`ProcessMemory`]: a live process via `process_vm_readv(2)` and
//!   `/proc/<pid>/maps`
//! - [`MemoryImage`]: sparse in-memory image standing in for a live target
//!   in tests

pub mod image;
pub mod memory_maps;
pub mod process;

pub use image::MemoryImage;
pub use memory_maps::{find_module_range, MemoryRange};
pub use process::ProcessMemory;

use crate::domain::ReadError;
use gscope_common::{from_bytes, Pod};
use std::mem::size_of;

/// Upper bound for a single bulk read (64 MiB)
///
/// Count fields come from the target; anything beyond this is corrupt.
pub const MAX_READ_BYTES: usize = 64 * 1024 * 1024;

/// Read-only view of a target address space
pub trait RemoteMemory {
    /// Fill `buf` from `addr`. Short reads are errors.
    ///
    /// # Errors
    /// Returns an error if any byte of the range cannot be read.
    fn read_bytes(&self, addr: u64, buf: &mut [u8]) -> Result<(), ReadError>;

    /// Fill as much of `buf` as is readable from `addr`, in order.
    ///
    /// Returns the number of leading bytes copied. Implementations that cannot
    /// report partial transfers fall back to an all-or-nothing read.
    ///
    /// # Errors
    /// Returns an error if not even the first byte can be read.
    fn read_bytes_prefix(&self, addr: u64, buf: &mut [u8]) -> Result<usize, ReadError> {
        self.read_bytes(addr, buf)?;
        Ok(buf.len())
    }

    /// Base load address of `module` in the target.
    ///
    /// # Errors
    /// Returns an error if the module is not loaded.
    fn module_base(&self, module: &str) -> Result<u64, ReadError>;

    /// Read `count` contiguous records starting at `addr`.
    ///
    /// # Errors
    /// Returns an error if the byte length overflows [`MAX_READ_BYTES`] or the
    /// underlying read fails.
    fn read_records<T: Pod>(&self, addr: u64, count: usize) -> Result<Vec<T>, ReadError>
    where
        Self: Sized,
    {
        let size = size_of::<T>();
        let len = count
            .checked_mul(size)
            .filter(|&len| len <= MAX_READ_BYTES)
            .ok_or(ReadError::TooLarge { addr, count })?;
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; len];
        self.read_bytes(addr, &mut buf)?;
        Ok(buf.chunks_exact(size).filter_map(from_bytes::<T>).collect())
    }

    /// Read up to `count` records at `addr`, stopping at the first
    /// unreadable byte.
    ///
    /// A trailing partial record is dropped.
    ///
    /// # Errors
    /// Returns an error if the byte length overflows [`MAX_READ_BYTES`] or
    /// nothing at `addr` is readable.
    fn read_records_prefix<T: Pod>(&self, addr: u64, count: usize) -> Result<Vec<T>, ReadError>
    where
        Self: Sized,
    {
        let size = size_of::<T>();
        let len = count
            .checked_mul(size)
            .filter(|&len| len <= MAX_READ_BYTES)
            .ok_or(ReadError::TooLarge { addr, count })?;
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; len];
        let got = self.read_bytes_prefix(addr, &mut buf)?.min(len);
        Ok(buf[..got].chunks_exact(size).filter_map(from_bytes::<T>).collect())
    }

    /// Read a single record at `addr`.
    ///
    /// # Errors
    /// Returns an error if the underlying read fails.
    fn read_record<T: Pod>(&self, addr: u64) -> Result<T, ReadError>
    where
        Self: Sized,
    {
        let mut buf = vec![0u8; size_of::<T>()];
        self.read_bytes(addr, &mut buf)?;
        from_bytes(&buf).ok_or(ReadError::ShortRead { addr, expected: size_of::<T>(), got: buf.len() })
    }

    /// Read a NUL-terminated string of at most `cap` bytes.
    ///
    /// Exactly `cap` bytes are read; the result stops at the first NUL.
    /// Invalid UTF-8 is replaced rather than rejected.
    ///
    /// # Errors
    /// Returns an error if the `cap`-byte read fails.
    fn read_c_string(&self, addr: u64, cap: usize) -> Result<String, ReadError>
    where
        Self: Sized,
    {
        let mut buf = vec![0u8; cap];
        self.read_bytes(addr, &mut buf)?;
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }
}
