//! The playback sink seam.

use async_trait::async_trait;
use tokio::sync::watch;

/// Downstream player the engine promotes ready payloads into.
///
/// The engine owns ordering decisions; the sink owns actual playback. Every
/// insertion names an anchor payload to insert before (`None` appends), and
/// the sink may veto a placement via [`can_insert_before`] when the anchor is
/// no longer eligible, for example because it is already being played.
///
/// [`can_insert_before`]: PlaybackSink::can_insert_before
#[async_trait]
pub trait PlaybackSink: Send + Sync + 'static {
    type Payload: Send;

    /// Whether inserting before `anchor` is currently possible. `None` asks
    /// about appending, which must always be possible.
    async fn can_insert_before(&self, anchor: Option<&Self::Payload>) -> bool;

    /// Insert `payload` before `anchor`, or append when `anchor` is `None`.
    async fn insert(&self, payload: Self::Payload, anchor: Option<Self::Payload>);

    /// Remove a payload from the sink's queue. Unknown payloads are a no-op.
    async fn remove(&self, payload: &Self::Payload);

    /// Clear the sink's queue.
    async fn remove_all(&self);

    /// Skip past the active payload to the next queued one.
    async fn advance(&self);

    async fn play(&self);

    async fn pause(&self);

    /// Observe the active payload. The engine finishes the previous active
    /// item and triggers the next promotion on every change.
    fn active_changes(&self) -> watch::Receiver<Option<Self::Payload>>;
}
