//! Structured error types for gscope
//!
//! Using thiserror for automatic Display implementation and error chaining.

use super::types::Pid;
use thiserror::Error;

/// Failure of a single remote access.
///
/// Expected whenever the target frees or remaps memory between two reads;
/// callers treat it as "this item is absent" rather than propagating it.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Bad address 0x{addr:x} ({len} bytes)")]
    BadAddress { addr: u64, len: usize },

    #[error("Short read at 0x{addr:x}: expected {expected} bytes, got {got}")]
    ShortRead { addr: u64, expected: usize, got: usize },

    #[error("Read of {count} records at 0x{addr:x} is too large")]
    TooLarge { addr: u64, count: usize },

    #[error("Module {0} is not mapped in the target")]
    ModuleNotMapped(String),

    #[error("process_vm_readv failed at 0x{addr:x}: {source}")]
    Os {
        addr: u64,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("Process {0} not found")]
    ProcessNotFound(Pid),

    #[error("Module {module} not found in target: {source}")]
    ModuleNotFound {
        module: String,
        #[source]
        source: ReadError,
    },

    #[error("Failed to load profile {path}: {reason}")]
    ProfileLoadFailed { path: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write report file: {0}")]
    WriteFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
