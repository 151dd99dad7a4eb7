//! Queue status and introspection types.

use crate::task::{TaskId, TaskStatus};

/// Queue-wide scheduling status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueStatus {
    /// No task in flight; the next `add` or `run` kicks the scheduler.
    #[default]
    Idle,
    /// A task is in flight and the scheduler will continue at its
    /// completion.
    Draining,
    /// Automatic progression is suspended. An in-flight task still
    /// completes and applies its effects, but no further task starts until
    /// `run` is called.
    Halted,
}

/// Point-in-time view of the queue, taken inside its serial domain.
///
/// Used by tests and diagnostics; the queue itself never acts on a
/// snapshot.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    pub status: QueueStatus,
    pub elevated: Vec<(TaskId, TaskStatus)>,
    pub normal: Vec<(TaskId, TaskStatus)>,
}

impl QueueSnapshot {
    /// Number of handles currently marked running (0 or 1 by invariant).
    pub fn running_count(&self) -> usize {
        self.elevated
            .iter()
            .chain(self.normal.iter())
            .filter(|(_, status)| *status == TaskStatus::Running)
            .count()
    }

    /// Total queued handles across both lanes.
    pub fn len(&self) -> usize {
        self.elevated.len() + self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elevated.is_empty() && self.normal.is_empty()
    }
}
