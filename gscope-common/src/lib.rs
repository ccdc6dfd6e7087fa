//! # Shared Data Structures (target process ↔ gscope)
//!
//! Binary layouts of the script VM structures that gscope reads out of a
//! running game process. All types use `#[repr(C)]` (or `#[repr(C, packed)]`
//! where the target packs them) so a record read from remote memory can be
//! reinterpreted directly. Every layout is pinned with compile-time size and
//! offset assertions: a mismatch against the target build fails the build,
//! not the scan.
//!
//! ## Key Types
//!
//! - [`ObjFileInfo`] / [`DebugFileInfo`] / [`GscObj`] - one compiled script unit
//! - [`ScrVarGlob`] / [`ScrVar`] / [`ScrVarValue`] - the global variable table
//! - [`ScrVarStackBuffer`] / [`InternalStackBufferVar`] - a suspended script frame
//! - [`VarType`] / [`VarValue`] - decoded type tag and tagged value
//!
//! Type tags are kept as raw bytes inside the records so that any bit pattern
//! read from the target is a valid record. Decoding happens through
//! [`ScrVarValue::decode`] and [`InternalStackBufferVar::decode`].

#![cfg_attr(not(test), no_std)]
// Unknown fields keep their target offsets in the name
#![allow(clippy::pub_underscore_fields)]

use core::mem::{offset_of, size_of};

// ============================================================================
// Target Addresses
// ============================================================================

/// RVA of the `int` holding the number of loaded script object files
pub const OBJ_FILE_INFO_COUNT_RVA: u64 = 0x50e_fb60;

/// RVA of the `ObjFileInfo` array
pub const OBJ_FILE_INFO_RVA: u64 = 0x50d_c2e0;

/// RVA of the `ScrVarGlob` instance
pub const SCR_VAR_GLOB_RVA: u64 = 0x51a_3500;

/// Module the RVAs above are relative to
pub const DEFAULT_MODULE: &str = "BlackOps3.exe";

/// Process hosting the script VM
pub const DEFAULT_PROCESS: &str = "boiii.exe";

/// Byte offset of the packed entry array inside a stack buffer
pub const STACK_BUFFER_DATA_OFFSET: u64 = offset_of!(ScrVarStackBuffer, buf_head) as u64;

/// Width of one packed stack buffer entry
pub const STACK_ENTRY_SIZE: usize = size_of::<InternalStackBufferVar>();

// ============================================================================
// Plain Old Data
// ============================================================================

/// Marker for records that can be rebuilt from raw remote bytes.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` (or packed), contain no implicit padding,
/// no pointers, references or enums, and accept every bit pattern.
#[allow(unsafe_code)]
pub unsafe trait Pod: Copy + 'static {}

/// Reinterpret `bytes` as a `T`. Returns `None` when the length is not exactly
/// `size_of::<T>()`.
#[must_use]
#[allow(unsafe_code)]
pub fn from_bytes<T: Pod>(bytes: &[u8]) -> Option<T> {
    if bytes.len() != size_of::<T>() {
        return None;
    }
    // SAFETY: length checked above, T accepts any bit pattern, and the read is
    // unaligned so the source slice may start anywhere.
    Some(unsafe { core::ptr::read_unaligned(bytes.as_ptr().cast::<T>()) })
}

/// View a record as its raw bytes.
#[must_use]
#[allow(unsafe_code)]
pub fn bytes_of<T: Pod>(value: &T) -> &[u8] {
    // SAFETY: Pod types have no padding, so every byte is initialized.
    unsafe {
        core::slice::from_raw_parts((value as *const T).cast::<u8>(), size_of::<T>())
    }
}

// ============================================================================
// Variable Types
// ============================================================================

/// Script variable type tag (one byte in the target)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VarType {
    Undefined = 0,
    Pointer = 1,
    String = 2,
    IString = 3,
    Vector = 4,
    Hash = 5,
    Float = 6,
    Integer = 7,
    UInt64 = 8,
    UIntPtr = 9,
    EntityOffset = 10,
    CodePos = 11,
    PreCodePos = 12,
    ApiFunction = 13,
    Function = 14,
    Stack = 15,
    Animation = 16,
    Thread = 17,
    NotifyThread = 18,
    TimeThread = 19,
    ChildThread = 20,
    Class = 21,
    Struct = 22,
    RemovedEntity = 23,
    Entity = 24,
    Array = 25,
    RemovedThread = 26,
    Free = 27,
    ThreadList = 28,
    EntList = 29,
}

impl VarType {
    /// Number of defined tags (`VAR_COUNT` in the target)
    pub const COUNT: u8 = 30;

    const ALL: [VarType; Self::COUNT as usize] = [
        VarType::Undefined,
        VarType::Pointer,
        VarType::String,
        VarType::IString,
        VarType::Vector,
        VarType::Hash,
        VarType::Float,
        VarType::Integer,
        VarType::UInt64,
        VarType::UIntPtr,
        VarType::EntityOffset,
        VarType::CodePos,
        VarType::PreCodePos,
        VarType::ApiFunction,
        VarType::Function,
        VarType::Stack,
        VarType::Animation,
        VarType::Thread,
        VarType::NotifyThread,
        VarType::TimeThread,
        VarType::ChildThread,
        VarType::Class,
        VarType::Struct,
        VarType::RemovedEntity,
        VarType::Entity,
        VarType::Array,
        VarType::RemovedThread,
        VarType::Free,
        VarType::ThreadList,
        VarType::EntList,
    ];

    /// Decode a raw tag byte. Out-of-range values yield `None`.
    #[must_use]
    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }
}

/// A variable value interpreted through its type tag.
///
/// Only the stack and code position payloads mean anything to gscope; every
/// other variant is carried without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarValue {
    /// Pointer to a `ScrVarStackBuffer` (may be null)
    Stack(u64),
    /// Absolute code position inside a compiled unit
    CodePos(u64),
    Other(VarType),
    Unknown(u8),
}

fn decode_value(raw_type: u8, payload: u64) -> VarValue {
    match VarType::from_raw(raw_type) {
        Some(VarType::Stack) => VarValue::Stack(payload),
        Some(VarType::CodePos) => VarValue::CodePos(payload),
        Some(other) => VarValue::Other(other),
        None => VarValue::Unknown(raw_type),
    }
}

// ============================================================================
// Compiled Units
// ============================================================================

/// Compiled script object header (`GSC_OBJ`)
///
/// The code segment lives at `[self + cseg_offset, self + cseg_offset + cseg_size)`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GscObj {
    pub magic: [u8; 8],
    pub source_crc: u32,
    pub include_offset: u32,
    pub animtree_offset: u32,
    pub cseg_offset: u32,
    pub stringtablefixup_offset: u32,
    pub _unknown_0x1c: [u32; 5],
    pub cseg_size: u32,
    pub _unknown_0x34: u32,
    pub _unknown_0x38: [u16; 6],
    pub _unknown_0x44: [u8; 4],
}

/// Debugger-side metadata for one script file
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DebugFileInfo {
    /// `char *` to the NUL-terminated source file name
    pub filename: u64,
    pub start_addr: u64,
    pub end_addr: u64,
    /// `void **` to `line_start_addr_count` ascending line start addresses
    pub line_start_addr: u64,
    pub line_start_addr_count: i32,
    pub _unknown_0x24: i32,
    pub source: u64,
    pub source_len: i32,
    pub _unknown_0x34: i32,
    pub gdb: u64,
}

/// One loaded script object file
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ObjFileInfo {
    /// Address of the live `GscObj`; the unit's identity and range base
    pub active_version: u64,
    pub baseline_version: u64,
    pub debug_info: DebugFileInfo,
}

// ============================================================================
// Variable Table
// ============================================================================

/// Tagged value slot of a script variable
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ScrVarValue {
    /// Value union; meaning depends on `raw_type`
    pub u: u64,
    pub raw_type: u8,
    pub _unknown_0x9: [u8; 3],
    pub _pad: u32,
}

impl ScrVarValue {
    #[must_use]
    pub fn var_type(&self) -> Option<VarType> {
        VarType::from_raw(self.raw_type)
    }

    #[must_use]
    pub fn decode(&self) -> VarValue {
        decode_value(self.raw_type, self.u)
    }
}

/// One slot of the global variable arena
///
/// The sibling/parent indices form a tree inside the arena. gscope only ever
/// iterates the arena flat.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ScrVar {
    pub value: ScrVarValue,
    /// Bitfield: name type (3), flags (5), ref count (24)
    pub info: u32,
    pub _unknown_0x14: [u8; 4],
    pub object: u64,
    pub object_w: u32,
    pub _unknown_0x24: [u8; 4],
    pub name_index: u64,
    pub next_sibling: u32,
    pub prev_sibling: u32,
    pub parent_id: u32,
    pub name_search_hash_list: u32,
}

/// Global script variable state; only the arena pointer is used
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ScrVarGlob {
    pub script_name_search_hash_list: u64,
    pub _unknown_0x8: [u8; 0x78],
    pub script_variables: u64,
    pub _unknown_0x88: [u8; 0x78],
}

// ============================================================================
// Stack Buffers
// ============================================================================

/// Header of a suspended script frame's buffer
///
/// `size` bytes of packed [`InternalStackBufferVar`] entries follow at
/// [`STACK_BUFFER_DATA_OFFSET`]; `buf_head` covers the first four of them so
/// the header reads like the target's `sizeof`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ScrVarStackBuffer {
    /// Code position the frame is suspended at
    pub pos: u64,
    pub _unknown_0x8: [u8; 4],
    pub size: u16,
    pub buf_len: u16,
    pub thread_id: u32,
    pub buf_head: [u8; 4],
}

/// One packed entry of a stack buffer
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct InternalStackBufferVar {
    pub raw_type: u8,
    pub value: u64,
}

impl InternalStackBufferVar {
    #[must_use]
    pub fn decode(&self) -> VarValue {
        let value = self.value;
        decode_value(self.raw_type, value)
    }
}

// ============================================================================
// Layout Assertions
// ============================================================================

const _: () = {
    assert!(size_of::<GscObj>() == 0x48);
    assert!(offset_of!(GscObj, cseg_offset) == 0x14);
    assert!(offset_of!(GscObj, cseg_size) == 0x30);

    assert!(size_of::<DebugFileInfo>() == 0x40);
    assert!(offset_of!(DebugFileInfo, line_start_addr) == 0x18);
    assert!(offset_of!(DebugFileInfo, line_start_addr_count) == 0x20);
    assert!(offset_of!(DebugFileInfo, source) == 0x28);
    assert!(offset_of!(DebugFileInfo, gdb) == 0x38);

    assert!(size_of::<ObjFileInfo>() == 0x50);
    assert!(offset_of!(ObjFileInfo, debug_info) == 0x10);

    assert!(size_of::<ScrVarValue>() == 0x10);
    assert!(offset_of!(ScrVarValue, raw_type) == 0x8);

    assert!(size_of::<ScrVar>() == 0x40);
    assert!(offset_of!(ScrVar, object) == 0x18);
    assert!(offset_of!(ScrVar, name_index) == 0x28);
    assert!(offset_of!(ScrVar, name_search_hash_list) == 0x3c);

    assert!(size_of::<ScrVarGlob>() == 0x100);
    assert!(offset_of!(ScrVarGlob, script_variables) == 0x80);

    assert!(offset_of!(ScrVarStackBuffer, size) == 0xc);
    assert!(offset_of!(ScrVarStackBuffer, thread_id) == 0x10);
    assert!(offset_of!(ScrVarStackBuffer, buf_head) == 0x14);
    assert!(size_of::<ScrVarStackBuffer>() == 0x18);

    assert!(size_of::<InternalStackBufferVar>() == 9);
};

// These unsafe impls let records be rebuilt from remote bytes.
// Every field is an integer or integer array and padding is spelled out.
#[allow(unsafe_code)]
unsafe impl Pod for GscObj {}

#[allow(unsafe_code)]
unsafe impl Pod for DebugFileInfo {}

#[allow(unsafe_code)]
unsafe impl Pod for ObjFileInfo {}

#[allow(unsafe_code)]
unsafe impl Pod for ScrVarValue {}

#[allow(unsafe_code)]
unsafe impl Pod for ScrVar {}

#[allow(unsafe_code)]
unsafe impl Pod for ScrVarGlob {}

#[allow(unsafe_code)]
unsafe impl Pod for ScrVarStackBuffer {}

#[allow(unsafe_code)]
unsafe impl Pod for InternalStackBufferVar {}

#[allow(unsafe_code)]
unsafe impl Pod for u8 {}

#[allow(unsafe_code)]
unsafe impl Pod for u64 {}

#[allow(unsafe_code)]
unsafe impl Pod for i32 {}
