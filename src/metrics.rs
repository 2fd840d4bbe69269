//! MetricsStore - latest detection metrics snapshot
//!
//! ## Responsibilities
//!
//! - Hold the most recent per-frame metrics (no history)
//! - Atomic replace on publish, clone-out on read
//! - Explicit reset to the documented default on stream start

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Aggregate detection statistics for the most recent processed frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Frames per second measured across the last loop iteration
    pub fps: f64,
    /// Confidence threshold the frame was detected at
    pub confidence: f32,
    /// Total detected objects in the frame
    pub object_count: u64,
    /// Per-class detection counts
    pub detections: HashMap<String, u32>,
}

impl MetricsSnapshot {
    /// Default snapshot published before any frame has been processed
    pub fn initial(confidence: f32) -> Self {
        Self {
            fps: 0.0,
            confidence,
            object_count: 0,
            detections: HashMap::new(),
        }
    }
}

/// MetricsStore instance
pub struct MetricsStore {
    current: RwLock<MetricsSnapshot>,
}

impl MetricsStore {
    /// Create a store holding the initial default
    pub fn new(default_confidence: f32) -> Self {
        Self {
            current: RwLock::new(MetricsSnapshot::initial(default_confidence)),
        }
    }

    /// Replace the snapshot; last write wins
    pub async fn publish(&self, snapshot: MetricsSnapshot) {
        let mut current = self.current.write().await;
        *current = snapshot;
    }

    /// Most recently published snapshot
    pub async fn read(&self) -> MetricsSnapshot {
        self.current.read().await.clone()
    }

    /// Install the default explicitly. A new session must never inherit a
    /// previous session's numbers as if they were its own.
    pub async fn reset(&self, confidence: f32) {
        let mut current = self.current.write().await;
        *current = MetricsSnapshot::initial(confidence);
        tracing::debug!(confidence = confidence, "metrics reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initial_read_returns_default() {
        let store = MetricsStore::new(0.3);
        let snapshot = store.read().await;

        assert_eq!(snapshot.fps, 0.0);
        assert_eq!(snapshot.confidence, 0.3);
        assert_eq!(snapshot.object_count, 0);
        assert!(snapshot.detections.is_empty());
    }

    #[tokio::test]
    async fn publish_is_last_write_wins() {
        let store = MetricsStore::new(0.3);

        let mut first = MetricsSnapshot::initial(0.3);
        first.object_count = 5;
        let mut second = MetricsSnapshot::initial(0.3);
        second.object_count = 2;
        second.fps = 12.5;

        store.publish(first).await;
        store.publish(second.clone()).await;

        assert_eq!(store.read().await, second);
    }

    #[tokio::test]
    async fn reset_discards_previous_session() {
        let store = MetricsStore::new(0.3);

        let mut stale = MetricsSnapshot::initial(0.3);
        stale.object_count = 42;
        stale.detections.insert("person".to_string(), 42);
        store.publish(stale).await;

        store.reset(0.5).await;

        let snapshot = store.read().await;
        assert_eq!(snapshot, MetricsSnapshot::initial(0.5));
    }
}
