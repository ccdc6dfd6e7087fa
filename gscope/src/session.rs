//! One snapshot-and-resolve pass over a target
//!
//! Nothing here survives between runs: each call re-reads the unit table and
//! the variable arena and builds a fresh report.

use crate::analysis::UsageAggregator;
use crate::domain::ScopeError;
use crate::profile::TargetProfile;
use crate::remote::RemoteMemory;
use crate::report::{Report, UnitSummary};
use crate::scanner::{read_variable_table, VariableTableScanner};
use crate::units::CompiledUnitIndex;
use log::info;

/// Resolve the base address of the profile's module
///
/// This is the only hard failure of a run: without the module there is no
/// anchor for any of the script VM globals.
///
/// # Errors
/// Returns `ModuleNotFound` if the module is not loaded in the target
pub fn module_base<M: RemoteMemory>(memory: &M, profile: &TargetProfile) -> Result<u64, ScopeError> {
    let base = memory
        .module_base(&profile.module)
        .map_err(|source| ScopeError::ModuleNotFound { module: profile.module.clone(), source })?;
    info!("{} base address: 0x{base:x}", profile.module);
    Ok(base)
}

/// Scan every suspended script thread and attribute its positions
///
/// Degraded reads (unit table, variable arena, individual frames) shrink the
/// report but never fail it.
///
/// # Errors
/// Returns `ModuleNotFound` if the module is not loaded in the target
pub fn capture<M: RemoteMemory>(memory: &M, profile: &TargetProfile) -> Result<Report, ScopeError> {
    let base = module_base(memory, profile)?;

    let units = CompiledUnitIndex::load(memory, base, profile);
    let variables = read_variable_table(memory, base, profile);

    let scanner = VariableTableScanner::new(memory, &variables);
    let result = UsageAggregator::aggregate(&units, scanner.frames());

    info!(
        "Scanned {} frames: {} positions attributed, {} unresolved",
        result.frames_scanned,
        result.resolved_positions(),
        result.unresolved_positions
    );

    Ok(Report::build(profile, base, &units, &result))
}

/// List every compiled unit the target has loaded
///
/// # Errors
/// Returns `ModuleNotFound` if the module is not loaded in the target
pub fn list_units<M: RemoteMemory>(memory: &M, profile: &TargetProfile) -> Result<Vec<UnitSummary>, ScopeError> {
    let base = module_base(memory, profile)?;
    let units = CompiledUnitIndex::load(memory, base, profile);
    Ok(UnitSummary::collect(&units))
}
