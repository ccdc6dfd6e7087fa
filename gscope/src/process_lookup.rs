//! Auto-detect a process PID from its name.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::Pid;

/// Result of process lookup.
#[derive(Debug)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub exe_path: Option<PathBuf>,
    pub command: String,
}

/// Find a process by name.
///
/// Searches `/proc` for processes matching the given name.
/// Matches against the command name from `/proc/<pid>/stat` and
/// the executable basename from `/proc/<pid>/exe`. Games running under
/// Wine show their Windows image name as the command name while `exe`
/// points at the Wine loader, so `exe` is optional.
///
/// # Errors
/// - No processes found
/// - Multiple processes found (ambiguous)
pub fn find_process_by_name(name: &str) -> Result<ProcessInfo> {
    let mut matches: Vec<ProcessInfo> = Vec::new();

    let proc_dir = fs::read_dir("/proc").context("Failed to read /proc")?;

    for entry in proc_dir.flatten() {
        let file_name = entry.file_name();
        let pid_str = file_name.to_string_lossy();

        let Ok(pid) = pid_str.parse::<i32>() else {
            continue;
        };

        // Get command name from stat
        let stat_path = format!("/proc/{pid}/stat");
        let Ok(stat_content) = fs::read_to_string(&stat_path) else {
            continue;
        };

        let Ok(command) = extract_comm(&stat_content) else {
            continue;
        };

        // Unreadable for processes we don't own; comm still identifies them
        let exe_path = fs::read_link(format!("/proc/{pid}/exe")).ok();

        if is_match(&command, exe_path.as_deref(), name) {
            matches.push(ProcessInfo { pid: Pid(pid), exe_path, command });
        }
    }

    match matches.len() {
        0 => bail!(
            "No process matching '{name}' found.\n\
             Check running processes with: ps aux | grep {name}"
        ),
        1 => Ok(matches.remove(0)),
        _ => {
            let list: Vec<String> =
                matches.iter().map(|m| format!("  {} ({})", m.pid.0, m.command)).collect();
            bail!(
                "Multiple processes match '{name}':\n{}\n\n\
                 Specify PID explicitly: gscope --pid <PID>",
                list.join("\n")
            )
        }
    }
}

/// Extract command name from `/proc/<pid>/stat`.
/// Format: "pid (comm) state ..."
fn extract_comm(stat_line: &str) -> Result<String> {
    let open = stat_line.find('(').context("Invalid stat format")?;
    let close = stat_line.rfind(')').context("Invalid stat format")?;
    if open >= close {
        bail!("Invalid stat format");
    }
    Ok(stat_line[open + 1..close].to_string())
}

/// Check if process matches the search pattern.
///
/// The kernel truncates `comm` to 15 bytes, so a long pattern matches a
/// command that is a prefix of it.
fn is_match(command: &str, exe_path: Option<&Path>, pattern: &str) -> bool {
    let exe_basename = exe_path.and_then(Path::file_name).and_then(|n| n.to_str()).unwrap_or("");

    let pattern_basename =
        Path::new(pattern).file_name().and_then(|n| n.to_str()).unwrap_or(pattern);

    command.eq_ignore_ascii_case(pattern_basename)
        || exe_basename.eq_ignore_ascii_case(pattern_basename)
        || (command.len() == 15 && pattern_basename.starts_with(command))
}
