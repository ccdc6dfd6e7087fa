//! # gscope - Main Entry Point
//!
//! Supports two operational modes:
//! - **Thread scan** (default): report the script files and lines every
//!   suspended script thread is in
//! - **Unit listing** (`--list-units`): list the loaded script files

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use gscope::cli::Args;
use gscope::domain::Pid;
use gscope::preflight::run_preflight_checks;
use gscope::process_lookup::find_process_by_name;
use gscope::profile::TargetProfile;
use gscope::remote::ProcessMemory;
use gscope::report::export_json;
use gscope::session;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("permission denied") || msg.contains("operation not permitted") {
        EXIT_NOPERM
    } else {
        EXIT_ERROR
    }
}

/// Build the effective profile: file (or built-in default) plus CLI overrides.
fn resolve_profile(args: &Args) -> Result<TargetProfile> {
    let mut profile = match args.profile {
        Some(ref path) => TargetProfile::load(path)?,
        None => TargetProfile::default(),
    };

    if let Some(ref module) = args.module {
        profile.module.clone_from(module);
    }
    if let Some(variables) = args.variables {
        profile.variable_capacity = variables;
    }
    Ok(profile)
}

/// Resolve the target PID from CLI arguments.
///
/// - `gscope --pid 1234` - explicit PID
/// - `gscope boiii.exe` - find process by name
/// - `gscope` - find the profile's default process
fn resolve_pid(args: &Args, profile: &TargetProfile) -> Result<Pid> {
    if let Some(pid) = args.pid {
        return Ok(Pid(pid));
    }

    let name = args.process.as_deref().unwrap_or(&profile.process);
    let info = find_process_by_name(name)?;
    info!("Found {} as PID {} ({:?})", info.command, info.pid.0, info.exe_path);
    Ok(info.pid)
}

fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    let profile = resolve_profile(&args)?;
    let pid = resolve_pid(&args, &profile)?;

    run_preflight_checks(pid, quiet)?;
    let memory = ProcessMemory::attach(pid)?;

    if !quiet {
        eprintln!("gscope v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("   Target: {} (profile {}, module {})", memory.pid(), profile.name, profile.module);
    }

    if args.list_units {
        for unit in session::list_units(&memory, &profile)? {
            println!("{}", unit.format());
        }
        return Ok(());
    }

    let report = session::capture(&memory, &profile)?;

    let stdout = std::io::stdout();
    report.write_text(stdout.lock()).context("Failed to write report")?;

    if let Some(ref path) = args.export {
        export_json(&report, path).with_context(|| format!("Failed to export {}", path.display()))?;
        if !quiet {
            eprintln!("   Exported report to {}", path.display());
        }
    }

    if !quiet {
        eprintln!("   {}", report.summary());
    }

    Ok(())
}
