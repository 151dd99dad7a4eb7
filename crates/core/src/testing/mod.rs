//! Testing utilities and mock implementations.
//!
//! This module provides a controllable playback sink plus a family of fetch
//! sources covering every completion shape the engine handles: instant
//! success, rejection, multi-round staging and manual resolution from the
//! test body.
//!
//! # Example
//!
//! ```rust,ignore
//! use preroll_core::testing::{InstantFetch, MockSink};
//!
//! let sink = MockSink::new();
//! let prefetcher = Prefetcher::new(PrerollConfig::default(), sink.clone());
//!
//! prefetcher.insert(InstantFetch::new("track-1"), None);
//!
//! // Drive the consumer side from the test body.
//! sink.activate_next().await;
//! assert_eq!(sink.active().await, Some("track-1".to_string()));
//! ```

mod fetchers;
mod mock_sink;

pub use fetchers::{InstantFetch, ManualFetch, ManualHandle, RejectingFetch, StagedFetch};
pub use mock_sink::MockSink;

use std::future::Future;
use std::time::Duration;

/// Poll `condition` until it holds, panicking after a couple of seconds.
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
