//! Analysis logic for scan results
//!
//! This module contains pure business logic for attributing code positions
//! to compiled units, separated from reading and presentation.

pub mod usage;

pub use usage::{AggregateResult, UnitUsage, UsageAggregator};
