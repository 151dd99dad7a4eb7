//! The task queue actor.

use std::collections::VecDeque;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::task::{Priority, Task, TaskHandle, TaskId, TaskStatus};

use super::types::{QueueSnapshot, QueueStatus};

/// Continuation invoked inside the serial domain after every completion.
/// The returned bool decides whether draining continues.
type Continuation<R> = Box<dyn FnMut(Option<R>) -> bool + Send>;

enum Command<R> {
    Add {
        handle: TaskHandle<R>,
        priority: Priority,
    },
    Remove {
        index: usize,
        priority: Priority,
    },
    RemoveAll,
    Run,
    Pause,
    Inspect(oneshot::Sender<QueueSnapshot>),
}

/// Handle to a single-flight, two-lane priority task queue.
///
/// All operations enqueue a command for the runner task and return
/// immediately; nothing executes on the caller's stack. Cloning the handle
/// shares the same queue. The runner exits once every handle is dropped.
pub struct TaskQueue<R> {
    commands: mpsc::UnboundedSender<Command<R>>,
}

impl<R> Clone for TaskQueue<R> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

impl<R: Send + 'static> TaskQueue<R> {
    /// Create an empty queue.
    ///
    /// `next` is the queue-wide continuation: it receives every completion
    /// value (including `None` ticks) and returns whether the queue should
    /// keep draining.
    pub fn new<F>(next: F) -> Self
    where
        F: FnMut(Option<R>) -> bool + Send + 'static,
    {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let runner = Runner {
            status: QueueStatus::Idle,
            elevated: VecDeque::new(),
            normal: VecDeque::new(),
            next: Box::new(next),
            completions: completions_tx,
        };
        tokio::spawn(runner.run(commands_rx, completions_rx));

        Self { commands }
    }

    /// Append a task to the given lane. If the queue is idle, execution
    /// begins on the next scheduler pass.
    pub fn add<T>(&self, task: T, priority: Priority)
    where
        T: Task<Response = R>,
    {
        self.send(Command::Add {
            handle: TaskHandle::new(task),
            priority,
        });
    }

    /// Remove the handle at `index` in the given lane, but only if it is not
    /// running. Out-of-range indices and running handles are silent no-ops.
    pub fn remove(&self, index: usize, priority: Priority) {
        self.send(Command::Remove { index, priority });
    }

    /// Clear both lanes. An in-flight task is not cancelled; its completion
    /// will observe an empty queue.
    pub fn remove_all(&self) {
        self.send(Command::RemoveAll);
    }

    /// Resume automatic progression, kicking the scheduler if idle.
    pub fn run(&self) {
        self.send(Command::Run);
    }

    /// Suspend automatic progression after the current task, if any,
    /// completes.
    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    /// Observe the queue state from inside its serial domain.
    pub async fn snapshot(&self) -> QueueSnapshot {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Inspect(tx));
        rx.await.unwrap_or_default()
    }

    fn send(&self, command: Command<R>) {
        // The runner outlives every handle; a failed send means the whole
        // queue is already gone, which only happens at shutdown.
        let _ = self.commands.send(command);
    }
}

struct Runner<R> {
    status: QueueStatus,
    elevated: VecDeque<TaskHandle<R>>,
    normal: VecDeque<TaskHandle<R>>,
    next: Continuation<R>,
    completions: mpsc::UnboundedSender<(TaskId, Option<R>)>,
}

impl<R: Send + 'static> Runner<R> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command<R>>,
        mut completions: mpsc::UnboundedReceiver<(TaskId, Option<R>)>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                completion = completions.recv() => {
                    if let Some((id, value)) = completion {
                        self.on_completed(id, value);
                    }
                }
            }
        }
        debug!("task queue runner stopped");
    }

    fn handle(&mut self, command: Command<R>) {
        match command {
            Command::Add { handle, priority } => {
                debug!(task = %handle.id(), ?priority, "task added");
                self.lane_mut(priority).push_back(handle);
                if self.status == QueueStatus::Idle {
                    self.exec();
                }
            }
            Command::Remove { index, priority } => {
                let lane = self.lane_mut(priority);
                match lane.get(index) {
                    Some(handle) if handle.status().is_removable() => {
                        let removed = lane.remove(index);
                        if let Some(handle) = removed {
                            debug!(task = %handle.id(), "task removed");
                        }
                    }
                    // Running or absent: removal is defined as a no-op.
                    _ => {}
                }
            }
            Command::RemoveAll => {
                self.elevated.clear();
                self.normal.clear();
                debug!("all queued tasks removed");
            }
            Command::Run => match self.status {
                QueueStatus::Draining => {}
                QueueStatus::Idle | QueueStatus::Halted => {
                    if self.has_running_handle() {
                        // A pause landed mid-run and the completion has not
                        // arrived yet; resuming just rearms the drain.
                        self.status = QueueStatus::Draining;
                    } else {
                        self.status = QueueStatus::Idle;
                        self.exec();
                    }
                }
            },
            Command::Pause => {
                self.status = QueueStatus::Halted;
                debug!("queue halted");
            }
            Command::Inspect(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn on_completed(&mut self, id: TaskId, value: Option<R>) {
        let halted = self.status == QueueStatus::Halted;
        let landed = if halted {
            TaskStatus::Parked
        } else {
            TaskStatus::Idle
        };

        // Identity lookup, elevated lane first.
        if let Some(index) = self.elevated.iter().position(|h| h.id() == id) {
            self.elevated[index].set_status(landed);
            if self.elevated[index].can_pop() {
                self.elevated.remove(index);
            }
        } else if let Some(index) = self.normal.iter().position(|h| h.id() == id) {
            self.normal[index].set_status(landed);
            if self.normal[index].can_pop() {
                self.normal.remove(index);
            }
        } else {
            // Removed while running; the completion still ticks the
            // continuation below.
            debug!(task = %id, "completion for a task no longer queued");
        }

        if self.status == QueueStatus::Draining {
            self.status = QueueStatus::Idle;
        }

        let keep_going = (self.next)(value);
        if keep_going && self.status == QueueStatus::Idle {
            self.exec();
        }
    }

    /// One scheduler pass: prune, select, start.
    fn exec(&mut self) {
        if self.has_running_handle() {
            warn!("scheduler pass requested while a task is in flight");
            return;
        }

        self.prune();

        let lane = if self.elevated.is_empty() {
            &mut self.normal
        } else {
            &mut self.elevated
        };
        let Some(handle) = lane.front_mut() else {
            self.status = QueueStatus::Idle;
            return;
        };

        handle.set_status(TaskStatus::Running);
        self.status = QueueStatus::Draining;

        let id = handle.id();
        let task = handle.share();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let value = task.run().await;
            let _ = completions.send((id, value));
        });
        debug!(task = %id, "task started");
    }

    /// Drop handles that report finished without having been started.
    fn prune(&mut self) {
        self.elevated
            .retain(|h| h.status() == TaskStatus::Running || !h.can_pop());
        self.normal
            .retain(|h| h.status() == TaskStatus::Running || !h.can_pop());
    }

    fn has_running_handle(&self) -> bool {
        self.elevated
            .iter()
            .chain(self.normal.iter())
            .any(|h| h.status() == TaskStatus::Running)
    }

    fn lane_mut(&mut self, priority: Priority) -> &mut VecDeque<TaskHandle<R>> {
        match priority {
            Priority::Elevated => &mut self.elevated,
            Priority::Normal => &mut self.normal,
        }
    }

    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            status: self.status,
            elevated: self
                .elevated
                .iter()
                .map(|h| (h.id(), h.status()))
                .collect(),
            normal: self.normal.iter().map(|h| (h.id(), h.status())).collect(),
        }
    }
}
