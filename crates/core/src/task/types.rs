//! Task trait and scheduling types.

use async_trait::async_trait;

/// Lane a task or item is scheduled on.
///
/// The elevated lane always wins selection over the normal lane, but only at
/// task boundaries: a running normal-lane task is never interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Normal,
    Elevated,
}

/// Execution status of a queued task handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Not currently executing; eligible for selection and removal.
    Idle,
    /// `run()` is in flight. Exactly one handle per queue may be in this
    /// state at any instant.
    Running,
    /// Completed while the queue was halted; stays in its lane and is
    /// re-selected once the queue resumes.
    Parked,
}

impl TaskStatus {
    /// True when the handle may be removed from its lane.
    pub fn is_removable(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

/// A unit of asynchronous work managed by the task queue.
///
/// `run` is invoked at most once concurrently per instance and completes
/// with `Some(response)` or `None` (a no-op tick). There is no separate
/// failure channel: callers encode a hard failure as `None` plus
/// `can_pop() == true`.
///
/// A task whose `can_pop` stays false after a completion remains at the head
/// of its lane and runs again on the next scheduling cycle, which allows
/// multi-step tasks to advance an internal cursor between runs.
///
/// The queue never times a task out. A task that never completes stalls the
/// whole queue (single in-flight task, by contract); every `Task`
/// implementation is responsible for its own eventual completion.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Value produced by a completed run.
    type Response: Send + 'static;

    /// Whether the task is finished and must leave the queue.
    ///
    /// Read by the queue only after a completion (and during lane pruning).
    fn can_pop(&self) -> bool;

    /// Perform one step of asynchronous work.
    async fn run(&self) -> Option<Self::Response>;
}
