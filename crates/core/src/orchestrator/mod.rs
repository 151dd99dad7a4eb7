//! The prefetch orchestrator.
//!
//! [`Prefetcher`] owns the elevated and normal item collections, computes the
//! admission budget, launches fetches, applies completions back to item
//! state, and promotes ready payloads into the playback sink. All of that
//! happens inside one runner task; the handle only sends commands.

mod runner;
mod types;

pub use runner::Prefetcher;
pub use types::{ItemSnapshot, Lane, PrefetchError, PrefetcherStatus};
