//! Report building and text output
//!
//! A [`Report`] is the flattened, presentation-ready form of one
//! [`AggregateResult`]: unit indices are resolved to source file names and
//! units without usage are dropped.
//!
//! ```text
//! scripts/zm/_zm_utility.gsc has 3 threads
//! 	@ line 41
//! 	@ line 41
//! scripts/shared/flag_shared.gsc has 1 threads
//! ```

pub mod export;

pub use export::{export_json, write_json};

use crate::analysis::AggregateResult;
use crate::domain::UnitIndex;
use crate::profile::TargetProfile;
use crate::remote::RemoteMemory;
use crate::units::CompiledUnitIndex;
use serde::Serialize;
use std::io::{self, Write};

/// Usage of one unit, ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    pub index: UnitIndex,
    pub file: String,
    pub usage_count: u64,
    /// 0-based line of each attributed position, in scan order
    pub lines: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Profile name the scan ran with
    pub target: String,
    pub module_base: u64,
    pub frames_scanned: u64,
    pub unresolved_positions: u64,
    /// Ascending by unit index
    pub units: Vec<UnitReport>,
}

impl Report {
    pub fn build<M: RemoteMemory>(
        profile: &TargetProfile,
        module_base: u64,
        units: &CompiledUnitIndex<'_, M>,
        result: &AggregateResult,
    ) -> Self {
        let units = result
            .units
            .iter()
            .map(|(&index, usage)| UnitReport {
                index,
                file: units.source_file_name(index),
                usage_count: usage.usage_count,
                lines: usage.lines.clone(),
            })
            .collect();

        Self {
            target: profile.name.clone(),
            module_base,
            frames_scanned: result.frames_scanned,
            unresolved_positions: result.unresolved_positions,
            units,
        }
    }

    /// Write the per-unit listing
    ///
    /// # Errors
    /// Returns an error if writing to `out` fails
    pub fn write_text<W: Write>(&self, mut out: W) -> io::Result<()> {
        for unit in &self.units {
            writeln!(out, "{} has {} threads", unit.file, unit.usage_count)?;
            for line in &unit.lines {
                writeln!(out, "\t@ line {line}")?;
            }
        }
        Ok(())
    }

    /// One-line summary for stderr
    #[must_use]
    pub fn summary(&self) -> String {
        let positions: u64 = self.units.iter().map(|u| u.usage_count).sum();
        format!(
            "{} frames, {} positions in {} files, {} unresolved",
            self.frames_scanned,
            positions,
            self.units.len(),
            self.unresolved_positions
        )
    }
}

/// One loaded unit, for `--list-units`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitSummary {
    pub index: UnitIndex,
    pub file: String,
    pub line_count: usize,
    /// `[start, end)` of the code segment, if its header was readable
    pub code_range: Option<(u64, u64)>,
}

impl UnitSummary {
    pub fn collect<M: RemoteMemory>(units: &CompiledUnitIndex<'_, M>) -> Vec<Self> {
        units
            .iter()
            .map(|(index, unit)| Self {
                index,
                file: units.source_file_name(index),
                line_count: unit.line_count(),
                code_range: unit.code_range.map(|r| (r.start, r.end)),
            })
            .collect()
    }

    /// Format as `file:line_count`, with the code range when known
    #[must_use]
    pub fn format(&self) -> String {
        match self.code_range {
            Some((start, end)) => format!("{}:{} [0x{start:x}, 0x{end:x})", self.file, self.line_count),
            None => format!("{}:{} [unreadable]", self.file, self.line_count),
        }
    }
}
