//! Controllable fetch sources for testing.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::item::{Fetch, Payload};

/// Succeeds immediately with a fixed payload.
pub struct InstantFetch<P> {
    payload: P,
}

impl<P: Payload> InstantFetch<P> {
    pub fn new(payload: impl Into<P>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

#[async_trait]
impl<P: Payload> Fetch for InstantFetch<P> {
    type Payload = P;

    fn is_done(&self) -> bool {
        true
    }

    async fn fetch(&self) -> Option<P> {
        Some(self.payload.clone())
    }
}

/// Completes immediately without a payload, rejecting the item.
pub struct RejectingFetch<P> {
    _payload: PhantomData<P>,
}

impl<P> RejectingFetch<P> {
    pub fn new() -> Self {
        Self {
            _payload: PhantomData,
        }
    }
}

impl<P> Default for RejectingFetch<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<P: Payload> Fetch for RejectingFetch<P> {
    type Payload = P;

    fn is_done(&self) -> bool {
        true
    }

    async fn fetch(&self) -> Option<P> {
        None
    }
}

/// Needs `rounds` empty fetch rounds before producing its payload, to
/// exercise re-admission of parked items.
pub struct StagedFetch<P> {
    payload: P,
    rounds: AtomicUsize,
    produced: AtomicBool,
}

impl<P: Payload> StagedFetch<P> {
    pub fn new(payload: impl Into<P>, rounds: usize) -> Self {
        Self {
            payload: payload.into(),
            rounds: AtomicUsize::new(rounds),
            produced: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<P: Payload> Fetch for StagedFetch<P> {
    type Payload = P;

    fn is_done(&self) -> bool {
        self.produced.load(Ordering::SeqCst)
    }

    async fn fetch(&self) -> Option<P> {
        if self.rounds.load(Ordering::SeqCst) > 0 {
            self.rounds.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        self.produced.store(true, Ordering::SeqCst);
        Some(self.payload.clone())
    }
}

struct ManualInner<P> {
    slot: Mutex<Option<Option<P>>>,
    done: AtomicBool,
    notify: Notify,
}

/// Blocks until the paired [`ManualHandle`] resolves it, so tests control
/// exactly when a fetch completes.
pub struct ManualFetch<P> {
    inner: Arc<ManualInner<P>>,
}

/// Test-side controller for a [`ManualFetch`].
pub struct ManualHandle<P> {
    inner: Arc<ManualInner<P>>,
}

impl<P> ManualFetch<P> {
    pub fn new() -> (Self, ManualHandle<P>) {
        let inner = Arc::new(ManualInner {
            slot: Mutex::new(None),
            done: AtomicBool::new(false),
            notify: Notify::new(),
        });
        (
            Self {
                inner: Arc::clone(&inner),
            },
            ManualHandle { inner },
        )
    }
}

impl<P> ManualHandle<P> {
    /// Finish the fetch: `Some` readies the item, `None` rejects it.
    pub fn resolve(&self, payload: Option<P>) {
        *self.inner.slot.lock().unwrap() = Some(payload);
        self.inner.done.store(true, Ordering::SeqCst);
        self.inner.notify.notify_one();
    }

    /// Finish the current round empty without being done, parking the item
    /// for another round.
    pub fn yield_round(&self) {
        *self.inner.slot.lock().unwrap() = Some(None);
        self.inner.notify.notify_one();
    }
}

#[async_trait]
impl<P: Payload> Fetch for ManualFetch<P> {
    type Payload = P;

    fn is_done(&self) -> bool {
        self.inner.done.load(Ordering::SeqCst)
    }

    async fn fetch(&self) -> Option<P> {
        loop {
            if let Some(value) = self.inner.slot.lock().unwrap().take() {
                return value;
            }
            self.inner.notify.notified().await;
        }
    }
}
