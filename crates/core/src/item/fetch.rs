use std::sync::Arc;

use async_trait::async_trait;

/// Marker for types the engine can buffer and hand to a playback sink.
///
/// Blanket-implemented; callers never implement this by hand.
pub trait Payload: Clone + PartialEq + Send + Sync + 'static {}

impl<T: Clone + PartialEq + Send + Sync + 'static> Payload for T {}

/// An item's payload source.
///
/// `fetch` may be called more than once for the same item: a source that
/// acquires its payload in stages returns `None` until the payload is ready,
/// and the engine schedules it again. Returning `None` from a source that
/// reports itself finished rejects the item.
#[async_trait]
pub trait Fetch: Send + Sync + 'static {
    type Payload: Payload;

    /// Whether this source has produced everything it will ever produce.
    fn is_done(&self) -> bool;

    /// Attempt to produce the payload.
    async fn fetch(&self) -> Option<Self::Payload>;
}

/// Object-safe view over [`Fetch`], so items with different source types can
/// share one payload type parameter.
#[async_trait]
pub(crate) trait DynFetch<P>: Send + Sync {
    fn is_done(&self) -> bool;
    async fn fetch(&self) -> Option<P>;
}

#[async_trait]
impl<F: Fetch> DynFetch<F::Payload> for F {
    fn is_done(&self) -> bool {
        Fetch::is_done(self)
    }

    async fn fetch(&self) -> Option<F::Payload> {
        Fetch::fetch(self).await
    }
}

pub(crate) type SharedFetch<P> = Arc<dyn DynFetch<P>>;
