//! Detector - object detection capability seam
//!
//! ## Responsibilities
//!
//! - Trait boundary for inference backends
//! - Detection types shared by the stream loop and one-shot paths
//! - Box overlay rendering for emitted frames

mod overlay;
mod remote;
mod stub;

pub use overlay::render;
pub use remote::RemoteDetector;
pub use stub::StubDetector;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One labelled detection box, pixel coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub label: String,
    pub conf: f32,
}

/// Result of a single inference call
#[derive(Debug, Clone, Default)]
pub struct Detections {
    pub boxes: Vec<BBox>,
}

impl Detections {
    /// Per-class occurrence counts
    pub fn class_counts(&self) -> HashMap<String, u32> {
        let mut counts = HashMap::new();
        for bbox in &self.boxes {
            *counts.entry(bbox.label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Total number of detected objects
    pub fn total(&self) -> u64 {
        self.boxes.len() as u64
    }
}

/// Detector backend trait.
///
/// Implementations receive one encoded image per call and must not retain
/// state across calls beyond connection reuse.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Backend identifier for logs and health reporting
    fn name(&self) -> &'static str;

    /// Run inference on one encoded image at the given confidence threshold
    async fn detect(&self, image: &[u8], confidence: f32) -> Result<Detections>;

    /// Backend reachability, surfaced by the health endpoint
    async fn health_check(&self) -> bool {
        true
    }
}
