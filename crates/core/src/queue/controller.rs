//! Couples a [`TaskQueue`] to an externally driven outstanding count.

use tokio::sync::watch;
use tracing::debug;

use crate::config::PrerollConfig;
use crate::task::{Priority, Task};

use super::runner::TaskQueue;
use super::types::QueueSnapshot;

/// A [`TaskQueue`] that drains only while the observed outstanding count is
/// below the configured buffer boundary.
///
/// The count arrives over a `watch` channel owned by the consumer side. Two
/// mechanisms enforce the boundary: the queue's continuation re-checks the
/// count after every completion, and a watcher task pauses or resumes the
/// queue whenever the count crosses the boundary in either direction.
pub struct ThrottledQueue<R> {
    inner: TaskQueue<R>,
}

impl<R> Clone for ThrottledQueue<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Send + 'static> ThrottledQueue<R> {
    /// Create a throttled queue.
    ///
    /// `next` receives every completion value; unlike the raw queue's
    /// continuation it has no say over draining, which is governed entirely
    /// by the outstanding count.
    pub fn new<F>(config: &PrerollConfig, outstanding: watch::Receiver<usize>, mut next: F) -> Self
    where
        F: FnMut(Option<R>) + Send + 'static,
    {
        let gate = config.clone();
        let count = outstanding.clone();
        let inner = TaskQueue::new(move |value| {
            next(value);
            gate.permits(*count.borrow())
        });

        // Apply the initial count before the caller can enqueue anything, so
        // a queue born at capacity never starts a task.
        if !config.permits(*outstanding.borrow()) {
            inner.pause();
        }

        let queue = inner.clone();
        let gate = config.clone();
        let mut outstanding = outstanding;
        tokio::spawn(async move {
            loop {
                let count = *outstanding.borrow_and_update();
                if gate.permits(count) {
                    queue.run();
                } else {
                    queue.pause();
                }
                if outstanding.changed().await.is_err() {
                    break;
                }
            }
            debug!("outstanding count source dropped, throttle watcher stopped");
        });

        Self { inner }
    }

    pub fn add<T>(&self, task: T, priority: Priority)
    where
        T: Task<Response = R>,
    {
        self.inner.add(task, priority);
    }

    pub fn remove(&self, index: usize, priority: Priority) {
        self.inner.remove(index, priority);
    }

    pub fn remove_all(&self) {
        self.inner.remove_all();
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        self.inner.snapshot().await
    }
}
