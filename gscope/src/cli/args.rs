//! CLI argument definitions

use crate::profile::MAX_VARIABLE_CAPACITY;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gscope",
    about = "Show which script files and lines a running game's script threads are in",
    after_help = "\
EXAMPLES:
    sudo gscope                              Attach to the profile's default process
    sudo gscope boiii.exe                    Find the process by name
    sudo gscope --pid 1234 --list-units      List loaded script files
    sudo gscope --pid 1234 --export out.json Also write the report as JSON"
)]
pub struct Args {
    /// Process name to attach to (defaults to the profile's process)
    #[arg(value_name = "PROCESS")]
    pub process: Option<String>,

    /// Process ID to attach to
    #[arg(short, long, conflicts_with = "process")]
    pub pid: Option<i32>,

    /// Target profile (JSON) with module name and global RVAs
    #[arg(long, value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Module the global RVAs are relative to (overrides the profile)
    #[arg(short, long)]
    pub module: Option<String>,

    /// Variable table slots to read (overrides the profile)
    #[arg(long, value_name = "N", value_parser = parse_variable_capacity)]
    pub variables: Option<usize>,

    /// Export the report as JSON
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// List loaded script files instead of scanning threads
    #[arg(long)]
    pub list_units: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_variable_capacity(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|e| format!("{e}"))?;
    if n == 0 || n > MAX_VARIABLE_CAPACITY {
        return Err(format!("must be between 1 and {MAX_VARIABLE_CAPACITY}"));
    }
    Ok(n)
}
