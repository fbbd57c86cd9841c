//! Pending I/O completions.
//!
//! A completion becomes ready at a given tick. When the I/O phase polls the
//! queue, every ready completion is handed out ordered by its arrival key and
//! then by insertion order. The arrival key defaults to the tick the result
//! became ready, which makes default delivery FIFO by readiness; tests can
//! pin an arbitrary order with [`IoQueue::set_rank`].

use crate::task_queue::TaskId;

#[derive(Debug, Clone, Copy)]
struct IoEntry {
    id: TaskId,
    ready_at: u64,
    rank: Option<u64>,
}

impl IoEntry {
    fn arrival_key(&self) -> (u64, TaskId) {
        (self.rank.unwrap_or(self.ready_at), self.id)
    }
}

/// Completions that are in flight or ready to be delivered.
#[derive(Debug, Default)]
pub struct IoQueue {
    entries: Vec<IoEntry>,
}

impl IoQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a completion whose result is available from `ready_at`.
    pub fn push(&mut self, id: TaskId, ready_at: u64) {
        self.entries.push(IoEntry {
            id,
            ready_at,
            rank: None,
        });
    }

    /// Overrides the arrival key of a pending completion.
    pub fn set_rank(&mut self, id: TaskId, rank: u64) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.rank = Some(rank);
                true
            }
            None => false,
        }
    }

    /// Drops a completion. Returns whether it was pending.
    pub fn remove(&mut self, id: TaskId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Removes and returns every completion ready at `now`, in arrival order.
    pub fn take_ready(&mut self, now: u64) -> Vec<TaskId> {
        let (mut ready, in_flight): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|entry| entry.ready_at <= now);
        self.entries = in_flight;
        ready.sort_by_key(IoEntry::arrival_key);
        ready.into_iter().map(|entry| entry.id).collect()
    }

    /// Whether any completion is ready at `now`.
    pub fn has_ready(&self, now: u64) -> bool {
        self.entries.iter().any(|entry| entry.ready_at <= now)
    }

    /// Earliest tick at which some completion becomes ready.
    pub fn next_ready_at(&self) -> Option<u64> {
        self.entries.iter().map(|entry| entry.ready_at).min()
    }

    /// Number of pending completions, ready or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
