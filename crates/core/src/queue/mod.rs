//! Priority task queue: serial execution across two priority lanes.
//!
//! [`TaskQueue`] runs at most one task at a time, selecting the elevated
//! lane's head before the normal lane's. All state lives inside a single
//! runner task (the serial mutation domain); callers and task completions
//! talk to it over a command channel, so execution never starts on the
//! caller's stack.
//!
//! [`ThrottledQueue`] couples a queue to an externally driven outstanding
//! count, pausing and resuming draining as the count crosses the configured
//! buffer boundary.

mod controller;
mod runner;
mod types;

pub use controller::ThrottledQueue;
pub use runner::TaskQueue;
pub use types::{QueueSnapshot, QueueStatus};
