//! Memory mapping utilities for process address space analysis
//!
//! This module parses /proc/pid/maps to find where a module is loaded. The
//! script VM's globals are addressed relative to the game executable's base,
//! so this is the first lookup of every run.

use crate::domain::{Pid, ReadError};
use log::info;
use std::fs;

/// Memory range of a loaded module in a process's address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl MemoryRange {
    /// Check if an address falls within this memory range
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// Read /proc/pid/maps and find the memory range of `module`
///
/// # Errors
/// Returns an error if /proc/pid/maps cannot be read or no mapping matches
pub fn module_range(pid: Pid, module: &str) -> Result<MemoryRange, ReadError> {
    let maps_path = format!("/proc/{}/maps", pid.0);
    let maps = fs::read_to_string(&maps_path)?;

    let range =
        find_module_range(&maps, module).ok_or_else(|| ReadError::ModuleNotMapped(module.to_string()))?;

    info!(
        "{} mapped at 0x{:x} - 0x{:x} (size: {} KB)",
        module,
        range.start,
        range.end,
        (range.end - range.start) / 1024
    );
    Ok(range)
}

/// Find all mappings of `module` in maps content, returning the range from
/// the minimum start address to the maximum end address
///
/// Mappings are matched on the path's file name, ASCII case-insensitively:
/// PE images loaded under Wine keep their Windows names (`BlackOps3.exe`)
/// but may sit on a case-preserving path.
#[must_use]
pub fn find_module_range(maps: &str, module: &str) -> Option<MemoryRange> {
    let mut start_addr = None;
    let mut end_addr = None;

    for line in maps.lines() {
        // "start-end perms offset dev inode pathname"
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 6 {
            continue;
        }

        let path = parts[5..].join(" ");
        let path = path.strip_suffix(" (deleted)").unwrap_or(&path);
        if !path.starts_with('/') {
            continue;
        }
        let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        if !file_name.eq_ignore_ascii_case(module) {
            continue;
        }

        let Some((start, end)) = parts[0].split_once('-') else {
            continue;
        };
        let (Ok(start), Ok(end)) = (u64::from_str_radix(start, 16), u64::from_str_radix(end, 16)) else {
            continue;
        };

        // Track the minimum start and maximum end
        start_addr = Some(start_addr.map_or(start, |s: u64| s.min(start)));
        end_addr = Some(end_addr.map_or(end, |e: u64| e.max(end)));
    }

    match (start_addr, end_addr) {
        (Some(start), Some(end)) => Some(MemoryRange { start, end }),
        _ => None,
    }
}
