//! Command-line arguments

use clap::{Parser, ValueEnum};

/// How the firing order is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One line per fired label
    #[default]
    Text,
    /// A single JSON report
    Json,
}

/// Deterministic event loop simulator
#[derive(Debug, Clone, Parser)]
#[command(name = "loop-sim", version, about = "Replays a scheduling script and prints the firing order")]
pub struct Cli {
    /// Script file to run (JSON, or YAML for .yaml/.yml)
    #[arg(short, long, conflicts_with = "eval")]
    pub file: Option<String>,

    /// Inline JSON script
    #[arg(short, long)]
    pub eval: Option<String>,

    /// Stop before the clock would pass this tick
    #[arg(short, long)]
    pub until: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Arguments equivalent to `loop-sim --file <path>`
    pub fn with_file(path: String) -> Self {
        Self {
            file: Some(path),
            eval: None,
            until: None,
            format: OutputFormat::Text,
            verbose: 0,
        }
    }
}
