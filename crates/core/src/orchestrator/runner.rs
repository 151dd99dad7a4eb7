//! The prefetcher actor.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::config::PrerollConfig;
use crate::item::{Fetch, ItemId, MediaItem, Payload, RequestState};
use crate::sink::PlaybackSink;

use super::types::{ItemSnapshot, Lane, PrefetchError, PrefetcherStatus};

enum Command<P> {
    Insert {
        item: MediaItem<P>,
        lane: Lane,
        after: Option<ItemId>,
    },
    Remove(ItemId),
    RemoveAll,
    Advance,
    Play,
    Pause,
    SetOutstanding(usize),
    Status(oneshot::Sender<PrefetcherStatus>),
}

enum Event<P> {
    FetchCompleted { id: ItemId, payload: Option<P> },
    ActiveChanged(Option<P>),
}

/// Handle to the prefetch engine.
///
/// Mutating operations enqueue a command for the runner task and return
/// immediately; the runner applies them in order inside its serial domain.
/// Cloning the handle shares the same engine.
pub struct Prefetcher<P> {
    commands: mpsc::UnboundedSender<Command<P>>,
    snapshots: watch::Receiver<Vec<ItemSnapshot>>,
}

impl<P> Clone for Prefetcher<P> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            snapshots: self.snapshots.clone(),
        }
    }
}

impl<P: Payload> Prefetcher<P> {
    pub fn new<S>(config: PrerollConfig, sink: S) -> Self
    where
        S: PlaybackSink<Payload = P>,
    {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshots_tx, snapshots) = watch::channel(Vec::new());

        // Re-enter the serial domain for every sink activity change.
        let mut active = sink.active_changes();
        let forward = events_tx.clone();
        tokio::spawn(async move {
            while active.changed().await.is_ok() {
                let current = active.borrow_and_update().clone();
                let _ = forward.send(Event::ActiveChanged(current));
            }
        });

        let runner = Runner {
            config,
            sink: Arc::new(sink),
            elevated: Vec::new(),
            normal: Vec::new(),
            requesting: HashSet::new(),
            outstanding: 0,
            active: None,
            active_item: None,
            events: events_tx,
            snapshots: snapshots_tx,
        };
        tokio::spawn(runner.run(commands_rx, events_rx));

        Self { commands, snapshots }
    }

    /// Append an item to the normal lane, or place it right after `after`
    /// when given and still present. Returns the item's identity.
    pub fn insert<F>(&self, fetch: F, after: Option<ItemId>) -> ItemId
    where
        F: Fetch<Payload = P>,
    {
        let item = MediaItem::new(fetch);
        let id = item.id();
        self.send(Command::Insert {
            item,
            lane: Lane::Normal,
            after,
        });
        id
    }

    /// Append an item to the elevated lane. Returns the item's identity.
    pub fn insert_elevated<F>(&self, fetch: F) -> ItemId
    where
        F: Fetch<Payload = P>,
    {
        let item = MediaItem::new(fetch);
        let id = item.id();
        self.send(Command::Insert {
            item,
            lane: Lane::Elevated,
            after: None,
        });
        id
    }

    /// Remove an item wherever it is in its lifecycle. Unknown identities
    /// are a no-op. An in-flight fetch is not interrupted; its completion is
    /// discarded.
    pub fn remove(&self, id: ItemId) {
        self.send(Command::Remove(id));
    }

    /// Drop every item and clear the sink's queue.
    pub fn remove_all(&self) {
        self.send(Command::RemoveAll);
    }

    /// Ask the sink to skip past its active payload.
    pub fn advance_to_next(&self) {
        self.send(Command::Advance);
    }

    pub fn play(&self) {
        self.send(Command::Play);
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    /// Report the consumer-side outstanding count used as the backpressure
    /// gate for admission.
    pub fn set_outstanding(&self, count: usize) {
        self.send(Command::SetOutstanding(count));
    }

    /// Aggregate counters, answered from inside the serial domain.
    pub async fn status(&self) -> Result<PrefetcherStatus, PrefetchError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Status(tx));
        rx.await.map_err(|_| PrefetchError::Shutdown)
    }

    /// Observe the combined item collection as a read-only projection.
    pub fn items(&self) -> watch::Receiver<Vec<ItemSnapshot>> {
        self.snapshots.clone()
    }

    fn send(&self, command: Command<P>) {
        // A failed send means the runner is gone, which only happens at
        // shutdown.
        let _ = self.commands.send(command);
    }
}

struct Runner<P> {
    config: PrerollConfig,
    sink: Arc<dyn PlaybackSink<Payload = P>>,
    elevated: Vec<MediaItem<P>>,
    normal: Vec<MediaItem<P>>,
    /// Identities of items currently mid-fetch. An evicted item keeps its
    /// slot here until the in-flight fetch completes.
    requesting: HashSet<ItemId>,
    outstanding: usize,
    /// Last active payload reported by the sink.
    active: Option<P>,
    /// Identity of the item that owns the active payload. Payloads compare
    /// by value, so eviction on an activity change goes through this id.
    active_item: Option<ItemId>,
    events: mpsc::UnboundedSender<Event<P>>,
    snapshots: watch::Sender<Vec<ItemSnapshot>>,
}

impl<P: Payload> Runner<P> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command<P>>,
        mut events: mpsc::UnboundedReceiver<Event<P>>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                event = events.recv() => {
                    if let Some(event) = event {
                        self.on_event(event).await;
                    }
                }
            }
        }
        debug!("prefetcher runner stopped");
    }

    async fn handle(&mut self, command: Command<P>) {
        match command {
            Command::Insert { item, lane, after } => {
                debug!(item = %item.id(), ?lane, "item inserted");
                let collection = self.lane_mut(lane);
                let index = after
                    .and_then(|id| collection.iter().position(|i| i.id() == id))
                    .map(|i| i + 1)
                    .unwrap_or(collection.len());
                collection.insert(index, item);
                self.settle().await;
            }
            Command::Remove(id) => self.remove(id).await,
            Command::RemoveAll => {
                self.elevated.clear();
                self.normal.clear();
                self.active_item = None;
                self.sink.remove_all().await;
                debug!("all items removed");
                self.publish();
            }
            Command::Advance => self.sink.advance().await,
            Command::Play => self.sink.play().await,
            Command::Pause => self.sink.pause().await,
            Command::SetOutstanding(count) => {
                self.outstanding = count;
                self.settle().await;
            }
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
    }

    async fn on_event(&mut self, event: Event<P>) {
        match event {
            Event::FetchCompleted { id, payload } => self.on_fetch_completed(id, payload).await,
            Event::ActiveChanged(active) => self.on_active_changed(active).await,
        }
    }

    async fn on_fetch_completed(&mut self, id: ItemId, payload: Option<P>) {
        self.requesting.remove(&id);
        match self.locate(id) {
            None => {
                // Evicted mid-fetch; the freed slot still re-triggers
                // admission below.
                debug!(item = %id, "completion for an item no longer present");
            }
            Some((lane, index)) => {
                let item = &mut self.lane_mut(lane)[index];
                match payload {
                    Some(payload) => {
                        item.set_payload(payload);
                        item.set_state(RequestState::ReadyForPlay);
                        debug!(item = %id, "payload ready");
                    }
                    None if item.share_fetch().is_done() => {
                        item.set_state(RequestState::Rejected);
                        info!(item = %id, "item rejected");
                        self.lane_mut(lane).remove(index);
                    }
                    None => {
                        // The source needs another round; park the item for
                        // re-admission.
                        item.set_state(RequestState::PrepareForRequest);
                        debug!(item = %id, "fetch round incomplete");
                    }
                }
            }
        }
        self.settle().await;
    }

    async fn on_active_changed(&mut self, active: Option<P>) {
        if self.active == active {
            return;
        }
        self.active = active;
        let previous = self.active_item.take();
        self.active_item = self.active.as_ref().and_then(|payload| {
            self.elevated
                .iter()
                .chain(self.normal.iter())
                .find(|i| {
                    i.state() == RequestState::NowPlaying
                        && i.payload() == Some(payload)
                        && Some(i.id()) != previous
                })
                .map(|i| i.id())
        });
        if let Some(id) = previous {
            self.finish(id);
        }
        self.settle().await;
    }

    /// Evict the item whose payload just finished playing, resolved by
    /// identity so an equal payload elsewhere cannot be finished instead.
    fn finish(&mut self, id: ItemId) {
        let Some((lane, index)) = self.locate(id) else {
            return;
        };
        let items = self.lane_mut(lane);
        if !items[index].set_state(RequestState::Finished) {
            return;
        }
        let item = items.remove(index);
        info!(item = %item.id(), ?lane, "item finished playing");
    }

    async fn remove(&mut self, id: ItemId) {
        let Some((lane, index)) = self.locate(id) else {
            return;
        };
        let item = self.lane_mut(lane).remove(index);
        if self.active_item == Some(id) {
            self.active_item = None;
        }
        if item.state() == RequestState::NowPlaying {
            if let Some(payload) = item.payload() {
                self.sink.remove(payload).await;
            }
        }
        debug!(item = %id, state = %item.state(), "item removed");
        self.settle().await;
    }

    /// Run admission and promotion to a fixpoint, then publish the
    /// projection. Every promotion re-opens admission.
    async fn settle(&mut self) {
        loop {
            self.admit();
            if !self.promote().await {
                break;
            }
        }
        self.publish();
    }

    /// Launch fetches for admissible items, elevated lane first, up to the
    /// window budget. Gated entirely by the consumer-side outstanding count.
    fn admit(&mut self) {
        if !self.config.permits(self.outstanding) {
            return;
        }
        let occupied = self.requesting.len() + self.buffered_count();
        let mut budget = self.config.capacity().saturating_sub(occupied);
        if budget == 0 {
            return;
        }

        let requesting = &mut self.requesting;
        let events = &self.events;
        for item in self.elevated.iter_mut().chain(self.normal.iter_mut()) {
            if budget == 0 {
                break;
            }
            if !item.state().is_admissible() {
                continue;
            }
            if item.state() == RequestState::Waiting {
                item.set_state(RequestState::PrepareForRequest);
            }
            item.set_state(RequestState::Requesting);
            requesting.insert(item.id());
            budget -= 1;

            let id = item.id();
            let fetch = item.share_fetch();
            let events = events.clone();
            debug!(item = %id, "fetch launched");
            tokio::spawn(async move {
                let payload = fetch.fetch().await;
                let _ = events.send(Event::FetchCompleted { id, payload });
            });
        }
    }

    /// Try a single promotion, elevated lane first. Returns whether a
    /// payload was inserted into the sink.
    async fn promote(&mut self) -> bool {
        for lane in [Lane::Elevated, Lane::Normal] {
            if self.promote_lane(lane).await {
                return true;
            }
        }
        false
    }

    async fn promote_lane(&mut self, lane: Lane) -> bool {
        let items = self.lane(lane);
        // At most one now-playing item per lane.
        if items.iter().any(|i| i.state() == RequestState::NowPlaying) {
            return false;
        }
        let Some(index) = items
            .iter()
            .position(|i| i.state() == RequestState::ReadyForPlay)
        else {
            return false;
        };
        let Some(payload) = items[index].payload().cloned() else {
            return false;
        };

        // An elevated payload goes in ahead of the normal lane's queued
        // now-playing payload, but never ahead of what is actively playing.
        let anchor = match lane {
            Lane::Elevated => self
                .normal
                .iter()
                .find(|i| i.state() == RequestState::NowPlaying && !self.is_active(i))
                .and_then(|i| i.payload().cloned()),
            Lane::Normal => None,
        };

        if !self.sink.can_insert_before(anchor.as_ref()).await {
            debug!(?lane, "sink vetoed insertion");
            return false;
        }
        self.sink.insert(payload, anchor).await;

        let item = &mut self.lane_mut(lane)[index];
        item.set_state(RequestState::NowPlaying);
        info!(item = %item.id(), ?lane, "item promoted");
        true
    }

    /// Items holding the prefetch window. Promotion hands a payload over to
    /// the sink and frees its slot, so only ready items count.
    fn buffered_count(&self) -> usize {
        self.elevated
            .iter()
            .chain(self.normal.iter())
            .filter(|i| i.state() == RequestState::ReadyForPlay)
            .count()
    }

    fn is_active(&self, item: &MediaItem<P>) -> bool {
        self.active_item == Some(item.id())
    }

    fn locate(&self, id: ItemId) -> Option<(Lane, usize)> {
        if let Some(index) = self.elevated.iter().position(|i| i.id() == id) {
            return Some((Lane::Elevated, index));
        }
        if let Some(index) = self.normal.iter().position(|i| i.id() == id) {
            return Some((Lane::Normal, index));
        }
        None
    }

    fn lane(&self, lane: Lane) -> &[MediaItem<P>] {
        match lane {
            Lane::Elevated => &self.elevated,
            Lane::Normal => &self.normal,
        }
    }

    fn lane_mut(&mut self, lane: Lane) -> &mut Vec<MediaItem<P>> {
        match lane {
            Lane::Elevated => &mut self.elevated,
            Lane::Normal => &mut self.normal,
        }
    }

    fn status(&self) -> PrefetcherStatus {
        PrefetcherStatus {
            elevated_count: self.elevated.len(),
            normal_count: self.normal.len(),
            requesting_count: self.requesting.len(),
            buffered_count: self.buffered_count(),
            outstanding: self.outstanding,
            admitting: self.config.permits(self.outstanding),
        }
    }

    fn publish(&self) {
        let mut view = Vec::with_capacity(self.elevated.len() + self.normal.len());
        for (lane, items) in [(Lane::Elevated, &self.elevated), (Lane::Normal, &self.normal)] {
            view.extend(items.iter().map(|i| ItemSnapshot {
                id: i.id(),
                lane,
                state: i.state(),
            }));
        }
        let _ = self.snapshots.send(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{wait_until, InstantFetch, ManualFetch, MockSink, RejectingFetch};

    fn engine() -> (Prefetcher<String>, MockSink<String>) {
        let sink = MockSink::new();
        let prefetcher = Prefetcher::new(PrerollConfig::default(), sink.clone());
        (prefetcher, sink)
    }

    #[tokio::test]
    async fn test_insert_admits_and_promotes() {
        let (prefetcher, sink) = engine();
        let id = prefetcher.insert(InstantFetch::new("a"), None);

        wait_until(|| {
            let prefetcher = prefetcher.clone();
            async move {
                let view = prefetcher.items().borrow().clone();
                view.len() == 1 && view[0].state == RequestState::NowPlaying
            }
        })
        .await;

        let view = prefetcher.items().borrow().clone();
        assert_eq!(view[0].id, id);
        assert_eq!(view[0].lane, Lane::Normal);
        assert_eq!(sink.queued().await, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_admission_stops_at_capacity() {
        let (prefetcher, _sink) = engine();
        let mut handles = Vec::new();
        for _ in 0..6 {
            let (fetch, handle) = ManualFetch::new();
            prefetcher.insert(fetch, None);
            handles.push(handle);
        }

        wait_until(|| {
            let prefetcher = prefetcher.clone();
            async move { prefetcher.status().await.unwrap().requesting_count == 4 }
        })
        .await;

        let status = prefetcher.status().await.unwrap();
        assert_eq!(status.normal_count, 6);
        assert_eq!(status.requesting_count, 4);
        assert_eq!(status.buffered_count, 0);
    }

    #[tokio::test]
    async fn test_backpressure_blocks_admission() {
        let (prefetcher, _sink) = engine();
        prefetcher.set_outstanding(3);
        let (fetch, _handle) = ManualFetch::<String>::new();
        prefetcher.insert(fetch, None);

        wait_until(|| {
            let prefetcher = prefetcher.clone();
            async move {
                let status = prefetcher.status().await.unwrap();
                status.normal_count == 1 && !status.admitting
            }
        })
        .await;
        assert_eq!(prefetcher.status().await.unwrap().requesting_count, 0);

        prefetcher.set_outstanding(0);
        wait_until(|| {
            let prefetcher = prefetcher.clone();
            async move { prefetcher.status().await.unwrap().requesting_count == 1 }
        })
        .await;
    }

    #[tokio::test]
    async fn test_rejected_item_is_evicted() {
        let (prefetcher, _sink) = engine();
        let id = prefetcher.insert(RejectingFetch::new(), None);

        wait_until(|| {
            let prefetcher = prefetcher.clone();
            async move { prefetcher.status().await.unwrap().normal_count == 0 }
        })
        .await;
        assert!(prefetcher.items().borrow().iter().all(|i| i.id != id));
    }

    #[tokio::test]
    async fn test_removed_item_keeps_requesting_slot_until_completion() {
        let (prefetcher, _sink) = engine();
        let (fetch, handle) = ManualFetch::new();
        let id = prefetcher.insert(fetch, None);

        wait_until(|| {
            let prefetcher = prefetcher.clone();
            async move { prefetcher.status().await.unwrap().requesting_count == 1 }
        })
        .await;

        prefetcher.remove(id);
        wait_until(|| {
            let prefetcher = prefetcher.clone();
            async move { prefetcher.status().await.unwrap().normal_count == 0 }
        })
        .await;
        // The fetch is still in flight; the slot stays occupied.
        assert_eq!(prefetcher.status().await.unwrap().requesting_count, 1);

        handle.resolve(Some("late".to_string()));
        wait_until(|| {
            let prefetcher = prefetcher.clone();
            async move { prefetcher.status().await.unwrap().requesting_count == 0 }
        })
        .await;
    }

    #[tokio::test]
    async fn test_insert_after_places_item_in_lane_order() {
        let (prefetcher, _sink) = engine();
        prefetcher.set_outstanding(usize::MAX);
        let a = prefetcher.insert(InstantFetch::new("a"), None);
        let c = prefetcher.insert(InstantFetch::new("c"), None);
        let b = prefetcher.insert(InstantFetch::new("b"), Some(a));

        wait_until(|| {
            let prefetcher = prefetcher.clone();
            async move { prefetcher.status().await.unwrap().normal_count == 3 }
        })
        .await;
        let order: Vec<ItemId> = prefetcher.items().borrow().iter().map(|i| i.id).collect();
        assert_eq!(order, vec![a, b, c]);
    }
}
