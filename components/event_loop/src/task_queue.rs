//! Task representation and the FIFO queues used by the scheduler.
//!
//! Tasks live in the scheduler's task table; the queues only hold
//! [`TaskId`]s so that cancellation can remove an entry without touching the
//! callback.

use crate::scheduler::Scheduler;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Identifier of a task, unique within one [`Scheduler`].
///
/// Ids are issued in increasing order, so they double as the insertion
/// sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Returns the raw id value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque reference to a scheduled task.
///
/// Returned by every scheduling method and accepted by
/// [`Scheduler::cancel`], [`Scheduler::unref`] and [`Scheduler::ref_`].
/// A handle is only meaningful to the scheduler that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    epoch: u64,
    id: TaskId,
}

impl TaskHandle {
    pub(crate) fn new(epoch: u64, id: TaskId) -> Self {
        Self { epoch, id }
    }

    /// The id of the task this handle refers to.
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {} (epoch {})", self.id, self.epoch)
    }
}

/// The queue a task is delivered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    /// Next-tick work, drained completely before the loop moves on
    Microtask,
    /// One-shot or recurring timer
    Timer,
    /// Completed background I/O
    Io,
    /// Runs after the I/O phase of an iteration
    Immediate,
}

impl QueueKind {
    /// Lower-case name used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Microtask => "microtask",
            QueueKind::Timer => "timer",
            QueueKind::Io => "io",
            QueueKind::Immediate => "immediate",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The work carried by a task.
///
/// Callbacks receive the scheduler so they can enqueue further work.
pub(crate) enum Callback {
    Once(Box<dyn FnOnce(&mut Scheduler)>),
    Repeat(Box<dyn FnMut(&mut Scheduler)>),
}

/// A unit of deferred work owned by the scheduler.
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) kind: QueueKind,
    pub(crate) deadline: Option<u64>,
    pub(crate) repeat: Option<u64>,
    pub(crate) keeps_alive: bool,
    pub(crate) cancelled: bool,
    pub(crate) label: Option<String>,
    /// `None` while the callback is executing.
    pub(crate) callback: Option<Callback>,
}

impl Task {
    pub(crate) fn new(id: TaskId, kind: QueueKind, callback: Callback) -> Self {
        Self {
            id,
            kind,
            deadline: None,
            repeat: None,
            keeps_alive: true,
            cancelled: false,
            label: None,
            callback: Some(callback),
        }
    }

    /// The task's id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The queue the task is delivered from.
    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    /// Deadline tick for timers, `None` for every other kind.
    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// Repeat period of an interval timer.
    pub fn repeat(&self) -> Option<u64> {
        self.repeat
    }

    /// Whether this task alone keeps the loop alive.
    pub fn keeps_alive(&self) -> bool {
        self.keeps_alive
    }

    /// Whether a cancel request arrived while the task was executing.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Optional human-readable label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// True while the task's callback is on the stack.
    pub fn is_running(&self) -> bool {
        self.callback.is_none()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("deadline", &self.deadline)
            .field("repeat", &self.repeat)
            .field("keeps_alive", &self.keeps_alive)
            .field("cancelled", &self.cancelled)
            .field("label", &self.label)
            .field("running", &self.is_running())
            .finish()
    }
}

/// A FIFO queue of task ids.
///
/// Used for both the microtask and the immediate queue.
#[derive(Debug, Default)]
pub struct TaskQueue {
    queue: VecDeque<TaskId>,
}

impl TaskQueue {
    /// Creates a new empty TaskQueue.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Adds a task to the end of the queue.
    pub fn enqueue(&mut self, id: TaskId) {
        self.queue.push_back(id);
    }

    /// Removes and returns the next task from the queue.
    pub fn dequeue(&mut self) -> Option<TaskId> {
        self.queue.pop_front()
    }

    /// Removes a specific task, returning whether it was queued.
    pub fn remove(&mut self, id: TaskId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|queued| *queued != id);
        self.queue.len() != before
    }

    /// Takes every queued task, leaving the queue empty.
    ///
    /// Tasks enqueued after this call belong to the next batch.
    pub fn take_batch(&mut self) -> Vec<TaskId> {
        self.queue.drain(..).collect()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of tasks in the queue.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
