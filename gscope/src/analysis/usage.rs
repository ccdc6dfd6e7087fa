//! Per-unit usage aggregation.
//!
//! Every code position found on a script frame is attributed to the compiled
//! unit containing it. A unit's usage count goes up once per position, not
//! once per frame: a frame suspended three calls deep inside the same file
//! counts three times. This is per-call-site attribution.
//!
//! ## Data Flow
//!
//! ```text
//! FrameSample.positions
//!     │
//!     ├──► find_unit_containing()  ── miss ──► unresolved (native/engine code)
//!     │
//!     ├──► usage_count += 1
//!     │
//!     └──► find_line()  (units with a line table only)
//!              └──► lines.push(line)   (duplicates kept, scan order)
//! ```

use crate::domain::UnitIndex;
use crate::remote::RemoteMemory;
use crate::scanner::FrameSample;
use crate::units::CompiledUnitIndex;
use std::collections::BTreeMap;

/// Usage of one compiled unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitUsage {
    /// Code positions attributed to this unit.
    pub usage_count: u64,

    /// Resolved line of each attributed position, in scan order.
    ///
    /// Positions that fall at or past the unit's last line start contribute
    /// to `usage_count` only.
    pub lines: Vec<u32>,
}

/// Result of one aggregation pass.
///
/// Units iterate in ascending index order, so two passes over the same
/// snapshot produce identical results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateResult {
    pub units: BTreeMap<UnitIndex, UnitUsage>,

    /// Frames consumed.
    pub frames_scanned: u64,

    /// Positions outside every known unit.
    pub unresolved_positions: u64,
}

impl AggregateResult {
    #[must_use]
    pub fn usage(&self, unit: UnitIndex) -> Option<&UnitUsage> {
        self.units.get(&unit)
    }

    /// Total positions attributed to any unit.
    #[must_use]
    pub fn resolved_positions(&self) -> u64 {
        self.units.values().map(|u| u.usage_count).sum()
    }
}

/// Accumulates frame samples into an [`AggregateResult`].
pub struct UsageAggregator<'i, 'm, M: RemoteMemory> {
    index: &'i CompiledUnitIndex<'m, M>,
    result: AggregateResult,
}

impl<'i, 'm, M: RemoteMemory> UsageAggregator<'i, 'm, M> {
    #[must_use]
    pub fn new(index: &'i CompiledUnitIndex<'m, M>) -> Self {
        Self { index, result: AggregateResult::default() }
    }

    /// Attribute every position of `frame`.
    pub fn record_frame(&mut self, frame: &FrameSample) {
        self.result.frames_scanned += 1;
        for &pos in &frame.positions {
            self.record_position(pos);
        }
    }

    /// Attribute a single code position.
    pub fn record_position(&mut self, pos: u64) {
        let Some(unit) = self.index.find_unit_containing(pos) else {
            self.result.unresolved_positions += 1;
            return;
        };

        let usage = self.result.units.entry(unit).or_default();
        usage.usage_count += 1;

        let has_lines = self.index.unit(unit).is_some_and(|u| u.has_line_table());
        if has_lines {
            if let Some(line) = self.index.find_line(unit, pos) {
                usage.lines.push(line);
            }
        }
    }

    #[must_use]
    pub fn finish(self) -> AggregateResult {
        self.result
    }

    /// Aggregate a whole frame sequence.
    pub fn aggregate<I>(index: &'i CompiledUnitIndex<'m, M>, frames: I) -> AggregateResult
    where
        I: IntoIterator<Item = FrameSample>,
    {
        let mut aggregator = Self::new(index);
        for frame in frames {
            aggregator.record_frame(&frame);
        }
        aggregator.finish()
    }
}
