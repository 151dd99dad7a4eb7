//! Schedulable units of asynchronous work.
//!
//! A [`Task`] performs one step of async work per [`Task::run`] call and
//! reports through [`Task::can_pop`] whether it is finished. The queue holds
//! tasks through [`TaskHandle`], a type-erased, identity-comparable wrapper.

mod handle;
mod types;

pub use handle::{TaskHandle, TaskId};
pub use types::{Priority, Task, TaskStatus};
