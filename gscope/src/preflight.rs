//! Pre-flight checks for gscope
//!
//! Validates that the target can be read before attempting a scan.
//! Provides clear, actionable error messages when requirements aren't met.

#![allow(unsafe_code)] // geteuid() requires unsafe

use anyhow::{bail, Context, Result};
use log::warn;
use std::path::Path;

use crate::domain::Pid;

const PTRACE_SCOPE_PATH: &str = "/proc/sys/kernel/yama/ptrace_scope";

/// Run all pre-flight checks before attaching
pub fn run_preflight_checks(pid: Pid, quiet: bool) -> Result<()> {
    check_process_exists(pid)?;
    check_proc_access(pid)?;
    check_read_permission(quiet);
    Ok(())
}

/// Check if the target process exists
pub fn check_process_exists(pid: Pid) -> Result<()> {
    let proc_path = format!("/proc/{}", pid.0);
    if !Path::new(&proc_path).exists() {
        bail!(
            "Process {} not found.\n\n\
             Is the game still running? Check with: ps -p {}",
            pid.0,
            pid.0
        );
    }
    Ok(())
}

/// Check if we can read the process's memory maps
pub fn check_proc_access(pid: Pid) -> Result<()> {
    let maps_path = format!("/proc/{}/maps", pid.0);
    std::fs::read_to_string(&maps_path).with_context(|| {
        format!(
            "Cannot read {maps_path}\n\n\
             This usually means:\n\
             - The process doesn't exist (check: ps -p {})\n\
             - Permission denied (run with sudo)\n\
             - /proc is not mounted",
            pid.0
        )
    })?;
    Ok(())
}

/// Warn if `process_vm_readv` is likely to be refused
///
/// Non-root readers need ptrace access to the target; with Yama's
/// `ptrace_scope` above 0 that is limited to descendants.
fn check_read_permission(quiet: bool) {
    if quiet || unsafe { libc::geteuid() } == 0 {
        return;
    }

    let scope = std::fs::read_to_string(PTRACE_SCOPE_PATH).ok();
    if let Some(level) = parse_ptrace_scope(scope.as_deref()) {
        if level > 0 {
            warn!("{PTRACE_SCOPE_PATH} is {level}: remote reads will likely fail without sudo");
            eprintln!("warning: ptrace_scope={level}, run with sudo if the report comes back empty");
        }
    }
}

fn parse_ptrace_scope(content: Option<&str>) -> Option<u32> {
    content?.trim().parse().ok()
}
