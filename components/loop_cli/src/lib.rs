//! Event Loop Simulator CLI Library
//!
//! Provides the Simulation struct and supporting modules for the `loop-sim`
//! binary, which replays scheduling scripts and prints the firing order.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod report;
pub mod runtime;
pub mod script;
pub mod telemetry;

pub use cli::{Cli, OutputFormat};
pub use error::{CliError, CliResult};
pub use report::{EntrySource, Report, ReportEntry};
pub use runtime::Simulation;
pub use script::{Op, Script, ScriptFormat};
pub use telemetry::init_tracing;
