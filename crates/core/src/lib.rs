pub mod config;
pub mod item;
pub mod orchestrator;
pub mod queue;
pub mod sink;
pub mod task;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, ConfigError, PrerollConfig,
};
pub use item::{Fetch, ItemId, MediaItem, Payload, RequestState};
pub use orchestrator::{ItemSnapshot, Lane, PrefetchError, Prefetcher, PrefetcherStatus};
pub use queue::{QueueSnapshot, QueueStatus, TaskQueue, ThrottledQueue};
pub use sink::PlaybackSink;
pub use task::{Priority, Task, TaskHandle, TaskId, TaskStatus};
