//! Mock playback sink for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};

use crate::item::Payload;
use crate::sink::PlaybackSink;

/// Internal queue and playback state.
struct SinkState<P> {
    queue: Vec<P>,
    active: Option<P>,
    playing: bool,
    veto_inserts: bool,
    operations: Vec<String>,
}

/// Mock implementation of the [`PlaybackSink`] trait.
///
/// Provides controllable behavior for testing:
/// - Inspect the queued payloads and the recorded operation log
/// - Drive activity changes from the test body via [`activate_next`]
/// - Veto insertions to exercise the placement guard
///
/// [`activate_next`]: MockSink::activate_next
pub struct MockSink<P> {
    state: Arc<RwLock<SinkState<P>>>,
    active_tx: Arc<watch::Sender<Option<P>>>,
}

impl<P> Clone for MockSink<P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            active_tx: Arc::clone(&self.active_tx),
        }
    }
}

impl<P: Payload> Default for MockSink<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Payload> MockSink<P> {
    pub fn new() -> Self {
        let (active_tx, _) = watch::channel(None);
        Self {
            state: Arc::new(RwLock::new(SinkState {
                queue: Vec::new(),
                active: None,
                playing: false,
                veto_inserts: false,
                operations: Vec::new(),
            })),
            active_tx: Arc::new(active_tx),
        }
    }

    /// Simulate the player moving on: the head of the queue becomes the
    /// active payload, or activity ends when the queue is empty.
    pub async fn activate_next(&self) {
        let next = {
            let mut state = self.state.write().await;
            let next = if state.queue.is_empty() {
                None
            } else {
                Some(state.queue.remove(0))
            };
            state.active = next.clone();
            next
        };
        let _ = self.active_tx.send(next);
    }

    /// Make every subsequent anchored insertion fail the placement check.
    pub async fn set_veto_inserts(&self, veto: bool) {
        self.state.write().await.veto_inserts = veto;
    }

    /// Payloads queued behind the active one, in order.
    pub async fn queued(&self) -> Vec<P> {
        self.state.read().await.queue.clone()
    }

    pub async fn active(&self) -> Option<P> {
        self.state.read().await.active.clone()
    }

    pub async fn is_playing(&self) -> bool {
        self.state.read().await.playing
    }

    /// Recorded operation names, in call order.
    pub async fn operations(&self) -> Vec<String> {
        self.state.read().await.operations.clone()
    }
}

#[async_trait]
impl<P: Payload> PlaybackSink for MockSink<P> {
    type Payload = P;

    async fn can_insert_before(&self, anchor: Option<&P>) -> bool {
        let state = self.state.read().await;
        match anchor {
            None => true,
            Some(anchor) => !state.veto_inserts && state.queue.iter().any(|p| p == anchor),
        }
    }

    async fn insert(&self, payload: P, anchor: Option<P>) {
        let mut state = self.state.write().await;
        let index = anchor
            .and_then(|anchor| state.queue.iter().position(|p| *p == anchor))
            .unwrap_or(state.queue.len());
        state.queue.insert(index, payload);
        state.operations.push("insert".to_string());
    }

    async fn remove(&self, payload: &P) {
        let mut state = self.state.write().await;
        if let Some(index) = state.queue.iter().position(|p| p == payload) {
            state.queue.remove(index);
        }
        state.operations.push("remove".to_string());
    }

    async fn remove_all(&self) {
        let mut state = self.state.write().await;
        state.queue.clear();
        state.operations.push("remove_all".to_string());
    }

    async fn advance(&self) {
        self.state.write().await.operations.push("advance".to_string());
        self.activate_next().await;
    }

    async fn play(&self) {
        let mut state = self.state.write().await;
        state.playing = true;
        state.operations.push("play".to_string());
    }

    async fn pause(&self) {
        let mut state = self.state.write().await;
        state.playing = false;
        state.operations.push("pause".to_string());
    }

    fn active_changes(&self) -> watch::Receiver<Option<P>> {
        self.active_tx.subscribe()
    }
}
