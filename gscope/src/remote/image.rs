//! Sparse in-memory address space
//!
//! A [`MemoryImage`] holds a handful of mapped regions at absolute addresses
//! and answers reads exactly like a live target would: reads inside one
//! region succeed, anything else fails. Addresses can also be poisoned to
//! simulate memory the target frees between two reads.

use super::RemoteMemory;
use crate::domain::ReadError;
use gscope_common::{bytes_of, Pod};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default, Clone)]
pub struct MemoryImage {
    /// Region start → contents
    regions: BTreeMap<u64, Vec<u8>>,
    /// Lowercased module name → base
    modules: HashMap<String, u64>,
    /// Any read covering one of these addresses fails
    poisoned: Vec<u64>,
}

impl MemoryImage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map raw bytes at `addr`, replacing any region starting there.
    pub fn map_bytes(&mut self, addr: u64, bytes: Vec<u8>) -> &mut Self {
        self.regions.insert(addr, bytes);
        self
    }

    /// Map a contiguous array of records at `addr`.
    pub fn map_records<T: Pod>(&mut self, addr: u64, records: &[T]) -> &mut Self {
        let bytes = records.iter().flat_map(|r| bytes_of(r).iter().copied()).collect();
        self.map_bytes(addr, bytes)
    }

    /// Map `text` plus a NUL terminator, zero padded to at least `min_len`.
    pub fn map_c_string(&mut self, addr: u64, text: &str, min_len: usize) -> &mut Self {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        if bytes.len() < min_len {
            bytes.resize(min_len, 0);
        }
        self.map_bytes(addr, bytes)
    }

    pub fn add_module(&mut self, name: &str, base: u64) -> &mut Self {
        self.modules.insert(name.to_ascii_lowercase(), base);
        self
    }

    /// Make every read that covers `addr` fail.
    pub fn poison(&mut self, addr: u64) -> &mut Self {
        self.poisoned.push(addr);
        self
    }

    /// Remove the region starting at `addr`, as if the target freed it.
    pub fn unmap(&mut self, addr: u64) -> &mut Self {
        self.regions.remove(&addr);
        self
    }
}

impl RemoteMemory for MemoryImage {
    fn read_bytes(&self, addr: u64, buf: &mut [u8]) -> Result<(), ReadError> {
        let len = buf.len();
        let bad = || ReadError::BadAddress { addr, len };
        let end = addr.checked_add(len as u64).ok_or_else(bad)?;

        if self.poisoned.iter().any(|&p| p >= addr && p < end) {
            return Err(bad());
        }

        let (&start, bytes) = self.regions.range(..=addr).next_back().ok_or_else(bad)?;
        let offset = usize::try_from(addr - start).map_err(|_| bad())?;
        let src = offset.checked_add(len).and_then(|stop| bytes.get(offset..stop)).ok_or_else(bad)?;

        buf.copy_from_slice(src);
        Ok(())
    }

    /// Clipped to the end of the region holding `addr` and to the first
    /// poisoned address after it.
    fn read_bytes_prefix(&self, addr: u64, buf: &mut [u8]) -> Result<usize, ReadError> {
        let len = buf.len();
        if len == 0 {
            return Ok(0);
        }
        let bad = || ReadError::BadAddress { addr, len };

        let (&start, bytes) = self.regions.range(..=addr).next_back().ok_or_else(bad)?;
        let offset = usize::try_from(addr - start).map_err(|_| bad())?;
        let available = bytes.get(offset..).ok_or_else(bad)?;

        let poisoned_at = self
            .poisoned
            .iter()
            .filter(|&&p| p >= addr)
            .filter_map(|&p| usize::try_from(p - addr).ok())
            .min()
            .unwrap_or(usize::MAX);

        let got = len.min(available.len()).min(poisoned_at);
        if got == 0 {
            return Err(bad());
        }
        buf[..got].copy_from_slice(&available[..got]);
        Ok(got)
    }

    fn module_base(&self, module: &str) -> Result<u64, ReadError> {
        self.modules
            .get(&module.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| ReadError::ModuleNotMapped(module.to_string()))
    }
}
