//! # Compiled Unit Index
//!
//! Every script file the VM has loaded is described by an `ObjFileInfo`
//! record in a fixed array inside the game module. This module snapshots that
//! array once per run and answers two questions about a code position:
//!
//! 1. **Which unit?** Each unit's compiled code segment occupies
//!    `[obj + cseg_offset, obj + cseg_offset + cseg_size)` where `obj` is the
//!    address of its live `GscObj` header. Ranges of distinct units never
//!    overlap, so a linear scan finds at most one match.
//! 2. **Which line?** Units loaded with debug info carry an ascending table of
//!    line start addresses. Line `i` starts at entry `i`.
//!
//! ## Line Lookup Rule
//!
//! The lookup scans forward for the first start address strictly greater
//! than the position and answers the line before it:
//!
//! ```text
//! starts = [100, 150, 200]
//!   120 -> 0     150 -> 1     199 -> 1     200 -> none
//! ```
//!
//! A position at or past the last recorded start resolves to nothing. The
//! last line of a unit is only reachable when the table ends with a sentinel.
//! This matches what the engine's own debugger reports and is kept as is.
//!
//! ## Snapshot Semantics
//!
//! Code ranges are read while loading. Line tables are read on first use and
//! cached for the rest of the run, failures included, so one run never sees
//! two versions of the same table.

use crate::domain::UnitIndex;
use crate::profile::TargetProfile;
use crate::remote::{MemoryRange, RemoteMemory};
use gscope_common::{GscObj, ObjFileInfo};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One compiled script unit from the snapshot
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub info: ObjFileInfo,
    /// Code segment, or `None` if the `GscObj` header could not be read
    pub code_range: Option<MemoryRange>,
}

impl CompiledUnit {
    /// Address of the unit's live `GscObj`, which also identifies it
    #[must_use]
    pub fn descriptor(&self) -> u64 {
        self.info.active_version
    }

    /// Declared line table length (negative counts read as zero)
    #[must_use]
    pub fn line_count(&self) -> usize {
        usize::try_from(self.info.debug_info.line_start_addr_count).unwrap_or(0)
    }

    #[must_use]
    pub fn has_line_table(&self) -> bool {
        self.info.debug_info.line_start_addr_count != 0
    }
}

/// Resolve the code segment of the unit whose `GscObj` lives at `obj`.
fn read_code_range<M: RemoteMemory>(memory: &M, obj: u64) -> Option<MemoryRange> {
    if obj == 0 {
        return None;
    }
    let header: GscObj = match memory.read_record(obj) {
        Ok(header) => header,
        Err(e) => {
            debug!("Skipping unit at 0x{obj:x}: {e}");
            return None;
        }
    };
    let start = obj.checked_add(u64::from(header.cseg_offset))?;
    let end = start.checked_add(u64::from(header.cseg_size))?;
    Some(MemoryRange { start, end })
}

/// Line of `addr` given a unit's line start table.
///
/// Returns the index before the first entry strictly greater than `addr`
/// (or 0 when that is the first entry), and `None` when no entry is greater.
#[must_use]
pub fn line_for_address(starts: &[u64], addr: u64) -> Option<u32> {
    let next = starts.iter().position(|&start| addr < start)?;
    u32::try_from(next.saturating_sub(1)).ok()
}

/// Snapshot of the compiled units known to the script VM
pub struct CompiledUnitIndex<'m, M: RemoteMemory> {
    memory: &'m M,
    units: Vec<CompiledUnit>,
    filename_cap: usize,
    max_line_table_len: usize,
    /// Line tables read so far (`None` = read failed or implausible)
    line_tables: RefCell<HashMap<UnitIndex, Option<Rc<[u64]>>>>,
}

impl<'m, M: RemoteMemory> CompiledUnitIndex<'m, M> {
    /// Snapshot the obj-file-info array of the module loaded at `module_base`
    ///
    /// Never fails: an unreadable or implausible count, or an unreadable
    /// array, produces an empty index so the run reports nothing.
    pub fn load(memory: &'m M, module_base: u64, profile: &TargetProfile) -> Self {
        let count_addr = module_base.wrapping_add(profile.obj_file_info_count_rva);
        let array_addr = module_base.wrapping_add(profile.obj_file_info_rva);

        let count = match memory.read_record::<i32>(count_addr) {
            Ok(count) => count,
            Err(e) => {
                warn!("Cannot read compiled unit count at 0x{count_addr:x}: {e}");
                return Self::from_descriptors(memory, Vec::new(), profile);
            }
        };

        let count = match usize::try_from(count) {
            Ok(count) if count <= profile.max_units => count,
            _ => {
                warn!("Implausible compiled unit count {count}, ignoring unit table");
                return Self::from_descriptors(memory, Vec::new(), profile);
            }
        };

        let infos = memory.read_records::<ObjFileInfo>(array_addr, count).unwrap_or_else(|e| {
            warn!("Cannot read {count} compiled unit descriptors at 0x{array_addr:x}: {e}");
            Vec::new()
        });

        let index = Self::from_descriptors(memory, infos, profile);
        info!(
            "Loaded {} compiled units ({} with readable code ranges)",
            index.len(),
            index.units.iter().filter(|u| u.code_range.is_some()).count()
        );
        index
    }

    /// Build an index from already-read descriptors
    pub fn from_descriptors(memory: &'m M, infos: Vec<ObjFileInfo>, profile: &TargetProfile) -> Self {
        let units = infos
            .into_iter()
            .map(|info| CompiledUnit { code_range: read_code_range(memory, info.active_version), info })
            .collect();

        Self {
            memory,
            units,
            filename_cap: profile.filename_cap,
            max_line_table_len: profile.max_line_table_len,
            line_tables: RefCell::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    #[must_use]
    pub fn unit(&self, index: UnitIndex) -> Option<&CompiledUnit> {
        self.units.get(index.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (UnitIndex, &CompiledUnit)> {
        self.units.iter().enumerate().map(|(i, unit)| (UnitIndex(i), unit))
    }

    /// Find the unit whose code segment contains `addr`
    #[must_use]
    pub fn find_unit_containing(&self, addr: u64) -> Option<UnitIndex> {
        self.iter().find(|(_, unit)| unit.code_range.is_some_and(|range| range.contains(addr))).map(|(i, _)| i)
    }

    /// Find the source line of `addr` within `unit`
    ///
    /// `None` for units without line data, unreadable tables, and positions
    /// at or past the last recorded line start.
    #[must_use]
    pub fn find_line(&self, unit: UnitIndex, addr: u64) -> Option<u32> {
        let starts = self.line_table(unit)?;
        line_for_address(&starts, addr)
    }

    /// Line start table of `unit`, read on first use
    #[must_use]
    pub fn line_table(&self, unit: UnitIndex) -> Option<Rc<[u64]>> {
        if let Some(cached) = self.line_tables.borrow().get(&unit) {
            return cached.clone();
        }

        let table = self.read_line_table(unit);
        self.line_tables.borrow_mut().insert(unit, table.clone());
        table
    }

    fn read_line_table(&self, unit: UnitIndex) -> Option<Rc<[u64]>> {
        let info = &self.unit(unit)?.info.debug_info;

        let count = usize::try_from(info.line_start_addr_count).ok().filter(|&c| c > 0)?;
        if count > self.max_line_table_len {
            debug!("{unit}: implausible line table length {count}");
            return None;
        }

        match self.memory.read_records::<u64>(info.line_start_addr, count) {
            Ok(starts) => Some(Rc::from(starts)),
            Err(e) => {
                debug!("{unit}: cannot read line table at 0x{:x}: {e}", info.line_start_addr);
                None
            }
        }
    }

    /// Source file name of `unit`, or a placeholder if it cannot be read
    #[must_use]
    pub fn source_file_name(&self, unit: UnitIndex) -> String {
        let Some(compiled) = self.unit(unit) else {
            return format!("<{unit}>");
        };
        let ptr = compiled.info.debug_info.filename;
        let placeholder = || format!("<unit {} @ 0x{:x}>", unit.0, compiled.descriptor());

        if ptr == 0 {
            return placeholder();
        }
        match self.memory.read_c_string(ptr, self.filename_cap) {
            Ok(name) if !name.is_empty() => name,
            Ok(_) => placeholder(),
            Err(e) => {
                debug!("{unit}: cannot read file name at 0x{ptr:x}: {e}");
                placeholder()
            }
        }
    }
}
