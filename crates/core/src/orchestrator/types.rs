use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::{ItemId, RequestState};

#[derive(Debug, Error)]
pub enum PrefetchError {
    /// The runner task is gone; no further queries can be answered.
    #[error("prefetcher has shut down")]
    Shutdown,
}

/// Which ordered collection an item belongs to. Membership is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Elevated,
    Normal,
}

/// Read-only projection of one item, published for UI binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub lane: Lane,
    pub state: RequestState,
}

/// Aggregate counters, answered from inside the serial domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefetcherStatus {
    pub elevated_count: usize,
    pub normal_count: usize,
    /// Fetches currently in flight.
    pub requesting_count: usize,
    /// Ready items awaiting promotion; these still occupy the prefetch
    /// window.
    pub buffered_count: usize,
    /// Last outstanding count reported by the consumer side.
    pub outstanding: usize,
    /// Whether the outstanding count currently permits admission.
    pub admitting: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_serialization() {
        assert_eq!(serde_json::to_string(&Lane::Elevated).unwrap(), "\"elevated\"");
        assert_eq!(serde_json::to_string(&Lane::Normal).unwrap(), "\"normal\"");
    }

    #[test]
    fn test_status_default_is_empty() {
        let status = PrefetcherStatus::default();
        assert_eq!(status.requesting_count, 0);
        assert_eq!(status.buffered_count, 0);
        assert!(!status.admitting);
    }

    #[test]
    fn test_item_snapshot_serialization() {
        let snapshot = ItemSnapshot {
            id: ItemId::new(),
            lane: Lane::Normal,
            state: RequestState::Waiting,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: ItemSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
