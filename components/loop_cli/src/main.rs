//! Event loop simulator CLI
//!
//! Entry point for `loop-sim`. Parses CLI arguments and delegates to the
//! Simulation for execution.

use clap::Parser as ClapParser;
use loop_cli::{init_tracing, Cli, CliError, OutputFormat, Report, ScriptFormat, Simulation};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let simulation = Simulation::new().with_until(cli.until);

    let result = if let Some(file) = &cli.file {
        simulation.execute_file(file)
    } else if let Some(source) = &cli.eval {
        simulation.execute_string(source, ScriptFormat::Json)
    } else {
        // Default: show usage
        println!("loop-sim v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage:");
        println!("  loop-sim --file <FILE>     Run a JSON or YAML scheduling script");
        println!("  loop-sim --eval <JSON>     Run an inline JSON script");
        println!();
        println!("Run 'loop-sim --help' for more options.");
        return;
    };

    match result.and_then(|report| print_report(&report, cli.format)) {
        Ok(()) => {}
        Err(CliError::Io(e)) if cli.file.is_some() => {
            eprintln!(
                "Error: Could not read file '{}': {}",
                cli.file.as_deref().unwrap_or_default(),
                e
            );
            std::process::exit(1);
        }
        Err(CliError::Parse(e)) => {
            eprintln!("Script Error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_report(report: &Report, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => println!("{}", report.render_json()?),
    }
    Ok(())
}
