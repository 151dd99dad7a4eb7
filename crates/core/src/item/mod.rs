//! Media items and their request lifecycle.
//!
//! A [`MediaItem`] pairs a caller-supplied [`Fetch`] source with the state
//! machine that tracks it from admission through playback. Payload types are
//! opaque to the engine; anything cloneable and comparable qualifies via the
//! blanket [`Payload`] impl.

mod fetch;
mod types;

pub use fetch::{Fetch, Payload};
pub use types::{ItemId, MediaItem, RequestState};

pub(crate) use fetch::SharedFetch;
