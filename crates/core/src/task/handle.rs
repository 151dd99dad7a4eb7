//! Type-erased task handles with process-unique identity.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use super::{Task, TaskStatus};

/// Identity of a queued task. Assigned monotonically, never reused within a
/// process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Process-wide id source with init-once semantics.
struct TaskIdSeed {
    next: AtomicU64,
}

impl TaskIdSeed {
    fn assign(&self) -> TaskId {
        TaskId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

static TASK_IDS: Lazy<TaskIdSeed> = Lazy::new(|| TaskIdSeed {
    next: AtomicU64::new(0),
});

/// Object-safe view of a [`Task`], keyed by response type only.
#[async_trait]
pub(crate) trait DynTask<R>: Send + Sync {
    fn can_pop(&self) -> bool;
    async fn run(&self) -> Option<R>;
}

#[async_trait]
impl<T: Task> DynTask<T::Response> for T {
    fn can_pop(&self) -> bool {
        Task::can_pop(self)
    }

    async fn run(&self) -> Option<T::Response> {
        Task::run(self).await
    }
}

/// Uniform, identity-comparable handle over heterogeneous [`Task`]
/// implementations sharing a response type.
///
/// The queue owns the handle for its lifetime in a lane; equality and
/// removal are by [`TaskId`], since tasks themselves are not comparable.
pub struct TaskHandle<R> {
    id: TaskId,
    status: TaskStatus,
    task: Arc<dyn DynTask<R>>,
}

impl<R: Send + 'static> TaskHandle<R> {
    /// Wrap a task, assigning it a fresh identity.
    pub fn new<T>(task: T) -> Self
    where
        T: Task<Response = R>,
    {
        Self {
            id: TASK_IDS.assign(),
            status: TaskStatus::Idle,
            task: Arc::new(task),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    pub(crate) fn can_pop(&self) -> bool {
        self.task.can_pop()
    }

    /// Share the underlying task so its `run` future can execute outside the
    /// queue's serial domain.
    pub(crate) fn share(&self) -> Arc<dyn DynTask<R>> {
        Arc::clone(&self.task)
    }
}

impl<R> PartialEq for TaskHandle<R> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<R> Eq for TaskHandle<R> {}

impl<R> fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("status", &self.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Noop;

    #[async_trait]
    impl Task for Noop {
        type Response = u32;

        fn can_pop(&self) -> bool {
            true
        }

        async fn run(&self) -> Option<u32> {
            Some(1)
        }
    }

    #[test]
    fn test_handle_ids_are_unique() {
        let ids: HashSet<TaskId> = (0..100).map(|_| TaskHandle::new(Noop).id()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_handle_ids_unique_across_threads() {
        let joins: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..50).map(|_| TaskHandle::new(Noop).id()).collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all = HashSet::new();
        for join in joins {
            for id in join.join().unwrap() {
                assert!(all.insert(id), "duplicate id assigned");
            }
        }
    }

    #[test]
    fn test_handle_equality_is_by_id() {
        let a = TaskHandle::new(Noop);
        let b = TaskHandle::new(Noop);
        assert_eq!(a, a);
        assert_ne!(a, b);
    }

    #[test]
    fn test_new_handle_is_idle() {
        let handle = TaskHandle::new(Noop);
        assert_eq!(handle.status(), TaskStatus::Idle);
    }

    #[test]
    fn test_erased_run_and_can_pop() {
        let handle = TaskHandle::new(Noop);
        assert!(handle.can_pop());
        let value = tokio_test::block_on(handle.share().run());
        assert_eq!(value, Some(1));
    }
}
