//! Firing-order reports produced by the harness

use event_loop::{RunOutcome, RunSummary};
use serde::Serialize;
use std::fmt::Write as _;

/// Where a recorded label came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    /// A `log` op on the synchronous stack
    Sync,
    /// A microtask callback
    Microtask,
    /// A timer callback
    Timer,
    /// An I/O completion callback
    Io,
    /// An immediate callback
    Immediate,
}

impl EntrySource {
    fn as_str(&self) -> &'static str {
        match self {
            EntrySource::Sync => "sync",
            EntrySource::Microtask => "microtask",
            EntrySource::Timer => "timer",
            EntrySource::Io => "io",
            EntrySource::Immediate => "immediate",
        }
    }
}

/// One recorded label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// Clock value when it was recorded
    pub tick: u64,
    /// Loop iteration when it was recorded
    pub iteration: u64,
    /// Where it came from
    pub source: EntrySource,
    /// The label
    pub label: String,
}

/// Result of running a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Recorded labels in execution order
    pub entries: Vec<ReportEntry>,
    /// Loop statistics
    pub summary: RunSummary,
}

impl Report {
    /// Labels in execution order
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.label.as_str()).collect()
    }

    /// Human-readable rendering, one line per entry plus a summary line
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let _ = writeln!(
                out,
                "{:>6} {:>4}  {:<9}  {}",
                entry.tick,
                entry.iteration,
                entry.source.as_str(),
                entry.label
            );
        }
        let outcome = match self.summary.outcome {
            RunOutcome::Idle => "idle",
            RunOutcome::TickLimit => "tick limit reached",
            RunOutcome::Reentrant => "reentrant run refused",
        };
        let _ = writeln!(
            out,
            "-- {} after {} iterations, {} callbacks, tick {}",
            outcome,
            self.summary.iterations,
            self.summary.callbacks_run,
            self.summary.final_tick
        );
        out
    }

    /// Pretty-printed JSON rendering
    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
