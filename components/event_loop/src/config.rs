//! Scheduler configuration.

use serde::{Deserialize, Serialize};

/// Tunables for a [`Scheduler`](crate::Scheduler).
///
/// Deserialisable so that harness scripts can carry a `config` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopConfig {
    /// Smallest delay a timer can have. Requests below it, including zero,
    /// are raised to it. Values below one tick are treated as one.
    pub min_timer_ticks: u64,
    /// Whether fired tasks are appended to the scheduler's [`Trace`](crate::Trace).
    pub record_trace: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            min_timer_ticks: 1,
            record_trace: true,
        }
    }
}

impl LoopConfig {
    /// Enable or disable trace recording
    pub fn with_record_trace(mut self, enabled: bool) -> Self {
        self.record_trace = enabled;
        self
    }

    /// Set the minimum timer delay
    pub fn with_min_timer_ticks(mut self, ticks: u64) -> Self {
        self.min_timer_ticks = ticks;
        self
    }

    /// The effective minimum delay, never below one tick.
    pub(crate) fn timer_floor(&self) -> u64 {
        self.min_timer_ticks.max(1)
    }
}
