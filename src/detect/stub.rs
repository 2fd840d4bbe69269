//! Stub detector for tests and model-less operation.

use super::{BBox, Detections, Detector};
use crate::error::Result;
use async_trait::async_trait;

/// Returns a fixed detection set, filtered by the requested threshold.
pub struct StubDetector {
    boxes: Vec<BBox>,
}

impl StubDetector {
    pub fn new() -> Self {
        Self { boxes: Vec::new() }
    }

    pub fn with_boxes(boxes: Vec<BBox>) -> Self {
        Self { boxes }
    }

    /// Build synthetic boxes from (label, count) pairs, confidence 0.9 each.
    pub fn with_counts(counts: &[(&str, u32)]) -> Self {
        let mut boxes = Vec::new();
        for (label, n) in counts {
            for i in 0..*n {
                let offset = (boxes.len() as f32) * 20.0;
                boxes.push(BBox {
                    x1: offset,
                    y1: 10.0 + i as f32,
                    x2: offset + 16.0,
                    y2: 26.0 + i as f32,
                    label: label.to_string(),
                    conf: 0.9,
                });
            }
        }
        Self { boxes }
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Detector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn detect(&self, _image: &[u8], confidence: f32) -> Result<Detections> {
        let boxes = self
            .boxes
            .iter()
            .filter(|b| b.conf >= confidence)
            .cloned()
            .collect();
        Ok(Detections { boxes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn threshold_filters_boxes() {
        let detector = StubDetector::with_counts(&[("person", 2), ("car", 1)]);

        let low = detector.detect(b"", 0.3).await.unwrap();
        assert_eq!(low.total(), 3);

        let high = detector.detect(b"", 0.95).await.unwrap();
        assert_eq!(high.total(), 0);
    }
}
