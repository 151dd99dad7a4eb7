use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fetch::{Fetch, SharedFetch};

/// Unique identifier of a media item within the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a media item's payload request.
///
/// ```text
/// Waiting -> PrepareForRequest <-> Requesting -> ReadyForPlay -> NowPlaying -> Finished
///                 |                   |              |
///                 +-----> Rejected <--+--------------+
/// ```
///
/// `Rejected` is reachable from `PrepareForRequest`, `Requesting` and
/// `ReadyForPlay`; a fetch round that completes without being done sends the
/// item from `Requesting` back to `PrepareForRequest` for re-admission.
/// `Rejected` and `Finished` are terminal. Items can be evicted from any
/// non-terminal state by removal, which is not a transition of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Queued, not yet admitted by the buffer window.
    Waiting,
    /// Admitted; a fetch task is about to be scheduled.
    PrepareForRequest,
    /// A fetch is in flight.
    Requesting,
    /// Payload acquired and held in the buffer.
    ReadyForPlay,
    /// Handed to the playback sink.
    NowPlaying,
    /// The fetch finished without producing a payload.
    Rejected,
    /// Playback moved past this item.
    Finished,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Waiting => "waiting",
            RequestState::PrepareForRequest => "prepare_for_request",
            RequestState::Requesting => "requesting",
            RequestState::ReadyForPlay => "ready_for_play",
            RequestState::NowPlaying => "now_playing",
            RequestState::Rejected => "rejected",
            RequestState::Finished => "finished",
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Rejected | RequestState::Finished)
    }

    /// Whether the admission scan may pick this item up. Covers both fresh
    /// items and items parked after a not-yet-done fetch round.
    pub fn is_admissible(&self) -> bool {
        matches!(
            self,
            RequestState::Waiting | RequestState::PrepareForRequest
        )
    }

    pub fn can_transition_to(&self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Waiting, PrepareForRequest)
                | (PrepareForRequest, Requesting)
                | (PrepareForRequest, Rejected)
                | (Requesting, ReadyForPlay)
                // A fetch round that is not yet done parks the item for
                // re-admission.
                | (Requesting, PrepareForRequest)
                | (Requesting, Rejected)
                | (ReadyForPlay, NowPlaying)
                | (ReadyForPlay, Rejected)
                | (NowPlaying, Finished)
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued piece of media: its payload source plus lifecycle bookkeeping.
///
/// All mutation happens inside the orchestrator's serial domain; the public
/// surface is read-only.
pub struct MediaItem<P> {
    id: ItemId,
    state: RequestState,
    payload: Option<P>,
    fetch: SharedFetch<P>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<P> MediaItem<P> {
    pub fn new<F>(fetch: F) -> Self
    where
        F: Fetch<Payload = P>,
    {
        let now = Utc::now();
        Self {
            id: ItemId::new(),
            state: RequestState::Waiting,
            payload: None,
            fetch: Arc::new(fetch),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Advance the state machine. Illegal transitions are rejected here so
    /// callers inside the serial domain can rely on the invariants.
    pub(crate) fn set_state(&mut self, next: RequestState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        self.updated_at = Utc::now();
        true
    }

    pub(crate) fn set_payload(&mut self, payload: P) {
        self.payload = Some(payload);
        self.updated_at = Utc::now();
    }

    pub(crate) fn share_fetch(&self) -> SharedFetch<P> {
        Arc::clone(&self.fetch)
    }
}

impl<P> fmt::Debug for MediaItem<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaItem")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}
