//! Target profiles
//!
//! A profile names the process and module to attach to and the RVAs of the
//! script VM globals inside that module. The structure layouts themselves
//! are compiled in (`gscope-common`); a profile only moves the anchors, which
//! is what changes between patch builds of the same game version.
//!
//! Profiles are JSON. Every field is optional and falls back to the built-in
//! defaults; addresses may be written as numbers or `"0x..."` strings:
//!
//! ```json
//! {
//!     "name": "bo3-steam-latest",
//!     "module": "BlackOps3.exe",
//!     "obj_file_info_count_rva": "0x50efb60",
//!     "obj_file_info_rva": "0x50dc2e0",
//!     "scr_var_glob_rva": "0x51a3500"
//! }
//! ```

use crate::domain::ScopeError;
use crate::remote::MAX_READ_BYTES;
use gscope_common::{
    ScrVar, DEFAULT_MODULE, DEFAULT_PROCESS, OBJ_FILE_INFO_COUNT_RVA, OBJ_FILE_INFO_RVA, SCR_VAR_GLOB_RVA,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::mem::size_of;
use std::path::Path;

/// Slots read from the variable arena when no capacity is configured
///
/// The target's real arena size is not exported; over-reading is harmless.
pub const DEFAULT_VARIABLE_CAPACITY: usize = 130_000;

/// Largest variable capacity a single bulk read allows
pub const MAX_VARIABLE_CAPACITY: usize = MAX_READ_BYTES / size_of::<ScrVar>();

/// Bytes read for a unit's source file name
pub const DEFAULT_FILENAME_CAP: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetProfile {
    pub name: String,
    pub process: String,
    pub module: String,
    #[serde(deserialize_with = "hex_or_int")]
    pub obj_file_info_count_rva: u64,
    #[serde(deserialize_with = "hex_or_int")]
    pub obj_file_info_rva: u64,
    #[serde(deserialize_with = "hex_or_int")]
    pub scr_var_glob_rva: u64,
    pub variable_capacity: usize,
    pub filename_cap: usize,
    /// Unit counts above this are treated as a torn read
    pub max_units: usize,
    /// Line tables longer than this are treated as a torn read
    pub max_line_table_len: usize,
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self {
            name: "bo3".to_string(),
            process: DEFAULT_PROCESS.to_string(),
            module: DEFAULT_MODULE.to_string(),
            obj_file_info_count_rva: OBJ_FILE_INFO_COUNT_RVA,
            obj_file_info_rva: OBJ_FILE_INFO_RVA,
            scr_var_glob_rva: SCR_VAR_GLOB_RVA,
            variable_capacity: DEFAULT_VARIABLE_CAPACITY,
            filename_cap: DEFAULT_FILENAME_CAP,
            max_units: 4096,
            max_line_table_len: 1 << 20,
        }
    }
}

impl TargetProfile {
    /// Load a profile from a JSON file
    ///
    /// # Errors
    /// Returns `ProfileLoadFailed` if the file cannot be read or parsed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScopeError> {
        let path = path.as_ref();
        let fail = |reason: String| ScopeError::ProfileLoadFailed { path: path.display().to_string(), reason };

        let text = fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        Self::from_json(&text).map_err(|e| fail(e.to_string()))
    }

    /// Parse a profile from JSON text
    ///
    /// # Errors
    /// Returns an error if the text is not a valid profile
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HexOrInt {
    Int(u64),
    Text(String),
}

fn hex_or_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(value) => Ok(value),
        HexOrInt::Text(text) => {
            let text = text.trim();
            let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => text.parse(),
            };
            parsed.map_err(|e| serde::de::Error::custom(format!("invalid address {text:?}: {e}")))
        }
    }
}
