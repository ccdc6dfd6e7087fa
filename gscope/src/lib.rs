//! # gscope - Script Thread Inspector for a Running Game
//!
//! gscope reports which script files and source lines the suspended script
//! threads ("coroutines") of a running game are sitting in. It needs no
//! cooperation from the game: no debug hooks, no injected code. Everything
//! is reconstructed by reading the game's memory and interpreting the script
//! VM's structures through fixed binary layouts.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Target Process                           │
//! │      ObjFileInfo[]          ScrVarGlob ──► ScrVar[] arena       │
//! └───────────────┬─────────────────────────────┬───────────────────┘
//!                 │ process_vm_readv            │
//!                 ▼                             ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      gscope (This Crate)                        │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │    Units     │   │   Scanner    │──▶│   Analysis   │         │
//! │  │ (code ranges,│◀──│ (STACK slots,│   │ (usage per   │         │
//! │  │  line tables)│   │  CODEPOS)    │   │  unit/line)  │         │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘         │
//! │                                               ▼                 │
//! │                                        ┌──────────────┐         │
//! │                                        │    Report    │         │
//! │                                        │ (text, JSON) │         │
//! │                                        └──────────────┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`remote`]: the [`remote::RemoteMemory`] trait and its implementations
//!   (live process, in-memory image), module base lookup via `/proc/<pid>/maps`
//! - [`units`]: snapshot of compiled units; position → unit and → line
//! - [`scanner`]: variable arena snapshot; stack frames → code positions
//! - [`analysis`]: per-unit usage counts and line hits
//! - [`report`]: presentation-ready report, text output and JSON export
//! - [`session`]: one snapshot-and-resolve pass tying the above together
//! - [`profile`]: target profiles (module name, RVAs, read limits)
//! - [`cli`], [`process_lookup`], [`preflight`]: the binary's front end
//! - [`domain`]: newtypes and error enums
//!
//! ## Consistency Model
//!
//! The game keeps running while gscope reads it. Every read is a best-effort
//! snapshot and any of them may fail or observe a half-updated structure.
//! Failures are contained to the smallest item they affect (one unit, one
//! frame) and the run always produces a report. The only hard failure is a
//! missing process or module.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Scan the default target (boiii.exe / BlackOps3.exe)
//! sudo ./gscope
//!
//! # Explicit PID, JSON export
//! sudo ./gscope --pid <PID> --export threads.json
//!
//! # List loaded script files and their line table sizes
//! sudo ./gscope --pid <PID> --list-units
//! ```

// Expose modules for testing
pub mod analysis;
pub mod cli;
pub mod domain;
pub mod preflight;
pub mod process_lookup;
pub mod profile;
pub mod remote;
pub mod report;
pub mod scanner;
pub mod session;
pub mod units;
