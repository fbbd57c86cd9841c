//! Error types for scheduling and task lifecycle operations.

use crate::task_queue::TaskHandle;
use thiserror::Error;

/// Errors returned by [`Scheduler`](crate::Scheduler) operations.
///
/// Both variants are local and recoverable: they are reported to the caller
/// of the offending method and never abort a loop that is already running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// A timer, I/O latency or blocking interval was requested with a
    /// negative number of ticks, or with one that would carry the clock past
    /// `u64::MAX`. The request is rejected and nothing is queued.
    #[error("invalid delay of {0} ticks: delays must be non-negative and fit the clock")]
    InvalidDelay(i64),

    /// A lifecycle operation named a task this scheduler never issued, or one
    /// that has already been retired.
    #[error("unknown task handle: {0}")]
    UnknownHandle(TaskHandle),
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
