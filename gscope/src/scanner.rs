//! Variable table scanning
//!
//! The script VM keeps every live variable in one preallocated arena of
//! `ScrVar` slots. A suspended script thread owns a slot tagged `STACK`
//! whose value points at a `ScrVarStackBuffer`:
//!
//! ```text
//! ScrVar (STACK) ──► ScrVarStackBuffer
//!                    ├─ pos        code position the frame is suspended at
//!                    ├─ size       byte length of the packed entries
//!                    └─ entries    [type:u8 | value:u64] × size/9
//!                                   CODEPOS entries are return positions
//!                                   of the calls nested inside the frame
//! ```
//!
//! For each stack frame the scanner yields the `CODEPOS` entries in buffer
//! order, followed by the frame's own `pos`.
//!
//! The header and the entries are two separate reads against a target that
//! keeps running. A size that is not a whole number of entries means we
//! caught the buffer mid-update: the entries are ignored and only `pos` is
//! reported. A failed entry read means the buffer went away: the frame is
//! skipped.

use crate::profile::{TargetProfile, MAX_VARIABLE_CAPACITY};
use crate::remote::RemoteMemory;
use gscope_common::{
    InternalStackBufferVar, ScrVar, ScrVarGlob, ScrVarStackBuffer, VarValue, STACK_BUFFER_DATA_OFFSET,
    STACK_ENTRY_SIZE,
};
use log::{debug, info, warn};

/// Code positions recorded by one suspended script frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSample {
    /// Address of the frame's `ScrVarStackBuffer`
    pub frame: u64,
    pub thread_id: u32,
    /// Nested `CODEPOS` entries in buffer order, then the frame's own position
    pub positions: Vec<u64>,
}

/// Snapshot the variable arena of the module loaded at `module_base`
///
/// Reads up to `profile.variable_capacity` slots, stopping early where the
/// arena's mapping ends. Any other failure yields an empty table: there is
/// nothing to scan, but the run still completes.
pub fn read_variable_table<M: RemoteMemory>(memory: &M, module_base: u64, profile: &TargetProfile) -> Vec<ScrVar> {
    let glob_addr = module_base.wrapping_add(profile.scr_var_glob_rva);

    let glob: ScrVarGlob = match memory.read_record(glob_addr) {
        Ok(glob) => glob,
        Err(e) => {
            warn!("Cannot read ScrVarGlob at 0x{glob_addr:x}: {e}");
            return Vec::new();
        }
    };

    let arena = glob.script_variables;
    if arena == 0 {
        warn!("Script variable arena is not allocated");
        return Vec::new();
    }

    let capacity = profile.variable_capacity.min(MAX_VARIABLE_CAPACITY);
    if capacity < profile.variable_capacity {
        warn!("Variable capacity {} exceeds the read limit, reading {capacity} slots", profile.variable_capacity);
    }

    // The arena's real length is unknown; keep whatever part of it is mapped
    match memory.read_records_prefix::<ScrVar>(arena, capacity) {
        Ok(vars) => {
            info!("Read {} variable slots at 0x{arena:x}", vars.len());
            vars
        }
        Err(e) => {
            warn!("Cannot read {capacity} variable slots at 0x{arena:x}: {e}");
            Vec::new()
        }
    }
}

/// Walks stack variables in a variable table snapshot
pub struct VariableTableScanner<'a, M: RemoteMemory> {
    memory: &'a M,
    variables: &'a [ScrVar],
}

impl<'a, M: RemoteMemory> VariableTableScanner<'a, M> {
    pub fn new(memory: &'a M, variables: &'a [ScrVar]) -> Self {
        Self { memory, variables }
    }

    /// Frames of every `STACK` slot with a non-null buffer, in table order
    ///
    /// Frames whose buffer cannot be read are left out.
    pub fn frames(&self) -> impl Iterator<Item = FrameSample> + '_ {
        self.variables.iter().filter_map(|var| match var.value.decode() {
            VarValue::Stack(frame) if frame != 0 => self.read_frame(frame),
            _ => None,
        })
    }

    /// Read the code positions of the stack buffer at `frame`
    #[must_use]
    pub fn read_frame(&self, frame: u64) -> Option<FrameSample> {
        let header: ScrVarStackBuffer = match self.memory.read_record(frame) {
            Ok(header) => header,
            Err(e) => {
                debug!("Skipping frame 0x{frame:x}: {e}");
                return None;
            }
        };

        let mut positions = Vec::new();
        let size = usize::from(header.size);

        if size % STACK_ENTRY_SIZE != 0 {
            debug!("Frame 0x{frame:x}: buffer size {size} is not a multiple of {STACK_ENTRY_SIZE}, ignoring entries");
        } else if size != 0 {
            let data = frame.wrapping_add(STACK_BUFFER_DATA_OFFSET);
            let entries = match self.memory.read_records::<InternalStackBufferVar>(data, size / STACK_ENTRY_SIZE) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("Skipping frame 0x{frame:x}: cannot read {size} buffer bytes: {e}");
                    return None;
                }
            };

            positions.extend(entries.iter().filter_map(|entry| match entry.decode() {
                VarValue::CodePos(pos) => Some(pos),
                _ => None,
            }));
        }

        positions.push(header.pos);
        Some(FrameSample { frame, thread_id: header.thread_id, positions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryImage;
    use gscope_common::{ScrVarValue, VarType};

    fn var(ty: VarType, u: u64) -> ScrVar {
        ScrVar {
            value: ScrVarValue { u, raw_type: ty as u8, _unknown_0x9: [0; 3], _pad: 0 },
            info: 0,
            _unknown_0x14: [0; 4],
            object: 0,
            object_w: 0,
            _unknown_0x24: [0; 4],
            name_index: 0,
            next_sibling: 0,
            prev_sibling: 0,
            parent_id: 0,
            name_search_hash_list: 0,
        }
    }

    fn entries(values: &[(VarType, u64)]) -> Vec<u8> {
        let mut raw = Vec::new();
        for &(ty, value) in values {
            raw.push(ty as u8);
            raw.extend_from_slice(&value.to_le_bytes());
        }
        raw
    }

    /// Map a stack buffer (header + packed entries) at `addr`
    fn map_frame(image: &mut MemoryImage, addr: u64, pos: u64, size: u16, body: &[u8]) {
        let header = ScrVarStackBuffer {
            pos,
            _unknown_0x8: [0; 4],
            size,
            buf_len: size,
            thread_id: 7,
            buf_head: [0; 4],
        };
        let mut bytes = gscope_common::bytes_of(&header)[..STACK_BUFFER_DATA_OFFSET as usize].to_vec();
        bytes.extend_from_slice(body);
        // Keep the header read (0x18 bytes) in bounds for empty buffers
        bytes.resize(bytes.len().max(std::mem::size_of::<ScrVarStackBuffer>()), 0);
        image.map_bytes(addr, bytes);
    }

    #[test]
    fn test_frame_yields_nested_positions_then_own_position() {
        let mut image = MemoryImage::new();
        let body = entries(&[(VarType::CodePos, 0x1050), (VarType::Integer, 5), (VarType::CodePos, 0x2004)]);
        map_frame(&mut image, 0x9000, 0x2015, 27, &body);

        let vars = vec![var(VarType::Stack, 0x9000)];
        let scanner = VariableTableScanner::new(&image, &vars);
        let frames: Vec<FrameSample> = scanner.frames().collect();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame, 0x9000);
        assert_eq!(frames[0].thread_id, 7);
        assert_eq!(frames[0].positions, vec![0x1050, 0x2004, 0x2015]);
    }

    #[test]
    fn test_only_stack_slots_are_scanned() {
        let mut image = MemoryImage::new();
        map_frame(&mut image, 0x9000, 0x2015, 0, &[]);

        let vars = vec![
            var(VarType::Integer, 0x9000),
            var(VarType::CodePos, 0x9000),
            var(VarType::Free, 0),
            var(VarType::Stack, 0x9000),
        ];
        let scanner = VariableTableScanner::new(&image, &vars);
        assert_eq!(scanner.frames().count(), 1);
    }

    #[test]
    fn test_null_frame_is_skipped_without_read() {
        let mut image = MemoryImage::new();
        // Any read at 0 would fail anyway; poison it to be sure nothing tries
        image.poison(0);

        let vars = vec![var(VarType::Stack, 0)];
        let scanner = VariableTableScanner::new(&image, &vars);
        assert_eq!(scanner.frames().count(), 0);
    }

    #[test]
    fn test_corrupt_size_keeps_own_position() {
        let mut image = MemoryImage::new();
        let body = entries(&[(VarType::CodePos, 0x1050)]);
        // 10 bytes is not a whole number of 9-byte entries
        map_frame(&mut image, 0x9000, 0x2015, 10, &body);

        let vars = vec![var(VarType::Stack, 0x9000)];
        let scanner = VariableTableScanner::new(&image, &vars);
        let frames: Vec<FrameSample> = scanner.frames().collect();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].positions, vec![0x2015]);
    }

    #[test]
    fn test_torn_buffer_skips_frame_only() {
        let mut image = MemoryImage::new();
        // Header claims two entries but only one is mapped
        map_frame(&mut image, 0x9000, 0x2015, 18, &entries(&[(VarType::CodePos, 0x1050)]));
        map_frame(&mut image, 0xa000, 0x3000, 0, &[]);

        let vars = vec![var(VarType::Stack, 0x9000), var(VarType::Stack, 0xa000)];
        let scanner = VariableTableScanner::new(&image, &vars);
        let frames: Vec<FrameSample> = scanner.frames().collect();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame, 0xa000);
        assert_eq!(frames[0].positions, vec![0x3000]);
    }

    #[test]
    fn test_unreadable_header_skips_frame() {
        let image = MemoryImage::new();
        let vars = vec![var(VarType::Stack, 0xdead_0000)];
        let scanner = VariableTableScanner::new(&image, &vars);
        assert_eq!(scanner.frames().count(), 0);
    }

    #[test]
    fn test_read_variable_table() {
        let mut image = MemoryImage::new();
        let profile = TargetProfile { variable_capacity: 2, ..TargetProfile::default() };
        let base = 0x1_4000_0000;

        let mut glob_bytes = vec![0u8; std::mem::size_of::<ScrVarGlob>()];
        glob_bytes[0x80..0x88].copy_from_slice(&0x7000_u64.to_le_bytes());
        image.map_bytes(base + profile.scr_var_glob_rva, glob_bytes);
        image.map_records(0x7000, &[var(VarType::Stack, 0x9000), var(VarType::Free, 0)]);

        let vars = read_variable_table(&image, base, &profile);
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0].value.decode(), VarValue::Stack(0x9000));
    }

    #[test]
    fn test_read_variable_table_past_arena_end_keeps_mapped_slots() {
        let mut image = MemoryImage::new();
        let profile = TargetProfile { variable_capacity: 3, ..TargetProfile::default() };
        let base = 0x1_4000_0000;

        let mut glob_bytes = vec![0u8; std::mem::size_of::<ScrVarGlob>()];
        glob_bytes[0x80..0x88].copy_from_slice(&0x7000_u64.to_le_bytes());
        image.map_bytes(base + profile.scr_var_glob_rva, glob_bytes);
        // Only two of the three requested slots exist
        image.map_records(0x7000, &[var(VarType::Stack, 0x9000), var(VarType::Stack, 0xa000)]);

        let vars = read_variable_table(&image, base, &profile);
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[1].value.decode(), VarValue::Stack(0xa000));
    }

    #[test]
    fn test_read_variable_table_clamps_capacity() {
        let mut image = MemoryImage::new();
        let profile = TargetProfile { variable_capacity: usize::MAX, ..TargetProfile::default() };
        let base = 0x1_4000_0000;

        let mut glob_bytes = vec![0u8; std::mem::size_of::<ScrVarGlob>()];
        glob_bytes[0x80..0x88].copy_from_slice(&0x7000_u64.to_le_bytes());
        image.map_bytes(base + profile.scr_var_glob_rva, glob_bytes);
        image.map_records(0x7000, &[var(VarType::Stack, 0x9000)]);

        assert_eq!(read_variable_table(&image, base, &profile).len(), 1);
    }

    #[test]
    fn test_read_variable_table_failure_is_empty() {
        let image = MemoryImage::new();
        assert!(read_variable_table(&image, 0x1_4000_0000, &TargetProfile::default()).is_empty());
    }
}
