//! Timer storage keyed by deadline.
//!
//! Timers that share a deadline tick form a [`TimerGroup`] and fire in the
//! order they were armed. Groups themselves are ordered by deadline, so the
//! list always yields (deadline ascending, insertion order).

use crate::task_queue::TaskId;
use std::collections::{BTreeMap, VecDeque};

/// Timer tasks sharing one deadline tick.
#[derive(Debug, Default)]
pub struct TimerGroup {
    tasks: VecDeque<TaskId>,
}

impl TimerGroup {
    /// Task ids in firing order.
    pub fn tasks(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks.iter().copied()
    }

    /// Number of timers in the group.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if the group holds no timers.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// All armed timers, grouped by deadline.
#[derive(Debug, Default)]
pub struct TimerList {
    groups: BTreeMap<u64, TimerGroup>,
    len: usize,
}

impl TimerList {
    /// Creates an empty timer list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a timer at `deadline`, behind every timer already in that group.
    pub fn insert(&mut self, deadline: u64, id: TaskId) {
        self.groups.entry(deadline).or_default().tasks.push_back(id);
        self.len += 1;
    }

    /// Disarms a timer. Returns whether it was present.
    pub fn remove(&mut self, deadline: u64, id: TaskId) -> bool {
        let Some(group) = self.groups.get_mut(&deadline) else {
            return false;
        };
        let before = group.tasks.len();
        group.tasks.retain(|queued| *queued != id);
        let removed = group.tasks.len() != before;
        if group.tasks.is_empty() {
            self.groups.remove(&deadline);
        }
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.groups.keys().next().copied()
    }

    /// Pops the next timer whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<(u64, TaskId)> {
        let mut entry = self.groups.first_entry()?;
        let deadline = *entry.key();
        if deadline > now {
            return None;
        }
        let id = entry.get_mut().tasks.pop_front()?;
        if entry.get().is_empty() {
            entry.remove();
        }
        self.len -= 1;
        Some((deadline, id))
    }

    /// Iterates over the groups in deadline order.
    pub fn groups(&self) -> impl Iterator<Item = (u64, &TimerGroup)> + '_ {
        self.groups.iter().map(|(deadline, group)| (*deadline, group))
    }

    /// Total number of armed timers.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no timer is armed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
