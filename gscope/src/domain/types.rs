//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep a unit's position in the snapshot apart from
//! the raw remote addresses that flow through the scanner.

use serde::Serialize;
use std::fmt;

/// Process ID
///
/// Represents a process ID in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pid(pub i32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

/// Position of a compiled unit in the obj-file-info snapshot
///
/// Stable for the duration of one run and used as the unit's key in
/// aggregated results. Ordering follows the snapshot array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UnitIndex(pub usize);

impl fmt::Display for UnitIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}
