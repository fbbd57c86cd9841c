//! Record of fired tasks.

use crate::task_queue::{QueueKind, TaskId};
use serde::Serialize;

/// One callback execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Firing {
    /// Task that ran
    pub id: TaskId,
    /// Queue it was delivered from
    pub kind: QueueKind,
    /// Label set with [`Scheduler::set_label`](crate::Scheduler::set_label)
    pub label: Option<String>,
    /// Clock value when the callback started
    pub tick: u64,
    /// Loop iteration; `0` for work done before the loop first turned
    pub iteration: u64,
}

/// Firings in execution order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Trace {
    firings: Vec<Firing>,
}

impl Trace {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, firing: Firing) {
        self.firings.push(firing);
    }

    /// All recorded firings.
    pub fn firings(&self) -> &[Firing] {
        &self.firings
    }

    /// Labels of the recorded firings; unlabelled tasks show up as their id.
    pub fn labels(&self) -> Vec<String> {
        self.firings
            .iter()
            .map(|firing| match &firing.label {
                Some(label) => label.clone(),
                None => firing.id.to_string(),
            })
            .collect()
    }

    /// Number of recorded firings.
    pub fn len(&self) -> usize {
        self.firings.len()
    }

    /// Returns true if nothing has fired.
    pub fn is_empty(&self) -> bool {
        self.firings.is_empty()
    }

    /// Forgets every recorded firing.
    pub fn clear(&mut self) {
        self.firings.clear();
    }
}
