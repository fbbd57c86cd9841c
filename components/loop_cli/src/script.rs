//! Scheduling scripts.
//!
//! A script is a list of operations run as the initiating synchronous code.
//! Operations that schedule a callback carry a `then` list that runs inside
//! that callback, so nested scheduling can be expressed:
//!
//! ```json
//! { "ops": [
//!     { "op": "timeout", "label": "T0", "delay": 0,
//!       "then": [ { "op": "microtask", "label": "M" } ] },
//!     { "op": "immediate", "label": "Im" }
//! ] }
//! ```

use crate::error::CliResult;
use event_loop::LoopConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source syntax of a script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFormat {
    /// JSON document
    Json,
    /// YAML document
    Yaml,
}

impl ScriptFormat {
    /// Picks the format from a file extension; anything but `.yaml`/`.yml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => ScriptFormat::Yaml,
            _ => ScriptFormat::Json,
        }
    }
}

/// A parsed script
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Script {
    /// Scheduler configuration; defaults apply when absent
    #[serde(default)]
    pub config: LoopConfig,
    /// Operations of the initiating synchronous code
    #[serde(default)]
    pub ops: Vec<Op>,
}

impl Script {
    /// Parses a script in the given format
    pub fn parse(source: &str, format: ScriptFormat) -> CliResult<Self> {
        let script: Script = match format {
            ScriptFormat::Json => serde_json::from_str(source)?,
            ScriptFormat::Yaml => serde_yaml::from_str(source)?,
        };
        Ok(script)
    }
}

/// One scripted operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Records a label on the current stack
    Log {
        /// Recorded label
        label: String,
    },
    /// Schedules a microtask
    Microtask {
        /// Label reported when it fires
        label: String,
        /// Ops run inside the callback
        #[serde(default)]
        then: Vec<Op>,
    },
    /// Schedules a one-shot timer
    Timeout {
        /// Label reported when it fires
        label: String,
        /// Delay in ticks
        #[serde(default)]
        delay: i64,
        /// Ops run inside the callback
        #[serde(default)]
        then: Vec<Op>,
    },
    /// Schedules a recurring timer
    Interval {
        /// Label reported on every firing
        label: String,
        /// Period in ticks
        delay: i64,
        /// Cancel after this many firings
        #[serde(default)]
        times: Option<u32>,
        /// Ops run inside every firing
        #[serde(default)]
        then: Vec<Op>,
    },
    /// Schedules an I/O completion
    Io {
        /// Label reported when it is delivered
        label: String,
        /// Ticks until the result is ready
        #[serde(default)]
        latency: i64,
        /// Fixed arrival rank among ready completions
        #[serde(default)]
        rank: Option<u64>,
        /// Ops run inside the callback
        #[serde(default)]
        then: Vec<Op>,
    },
    /// Schedules an immediate
    Immediate {
        /// Label reported when it fires
        label: String,
        /// Ops run inside the callback
        #[serde(default)]
        then: Vec<Op>,
    },
    /// Cancels the task most recently scheduled under `target`
    Cancel {
        /// Label of the task
        target: String,
    },
    /// Makes a task keep the loop alive again
    Ref {
        /// Label of the task
        target: String,
    },
    /// Lets the loop exit while the task is pending
    Unref {
        /// Label of the task
        target: String,
    },
    /// Occupies the thread for a number of ticks
    Block {
        /// Ticks of blocking work
        ticks: i64,
    },
}
