//! StreamController - owned shared state for the live detection loop
//!
//! ## Responsibilities
//!
//! - Start/stop lifecycle with a cooperative cancellation signal
//! - Shared confidence threshold (freshness-at-next-read semantics)
//! - One-shot frame capture sharing the camera with the stream loop
//!
//! All mutable state lives behind this controller and reaches handlers
//! through AppState; there are no ambient globals.

mod session;

pub use session::{StreamSession, STREAM_CONTENT_TYPE};

use crate::camera::CameraResource;
use crate::detect::{self, Detector};
use crate::error::{Error, Result};
use crate::metrics::MetricsStore;
use crate::storage::FrameStore;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

pub struct StreamController {
    camera: Arc<CameraResource>,
    detector: Arc<dyn Detector>,
    metrics: Arc<MetricsStore>,
    frames: Arc<FrameStore>,
    confidence: RwLock<f32>,
    active: watch::Sender<bool>,
    jpeg_quality: u8,
}

impl StreamController {
    pub fn new(
        camera: Arc<CameraResource>,
        detector: Arc<dyn Detector>,
        metrics: Arc<MetricsStore>,
        frames: Arc<FrameStore>,
        default_confidence: f32,
        jpeg_quality: u8,
    ) -> Self {
        let (active, _) = watch::channel(false);
        Self {
            camera,
            detector,
            metrics,
            frames,
            confidence: RwLock::new(default_confidence),
            active,
            jpeg_quality,
        }
    }

    /// Shared metrics store (read by the poll endpoint)
    pub fn metrics(&self) -> &MetricsStore {
        &self.metrics
    }

    /// Whether the stream is marked active
    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Cancellation signal for a session loop
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }

    /// Open the camera and mark the stream active. Idempotent.
    ///
    /// Frame production starts only when a client attaches to the stream
    /// endpoint; this just readies the device and the flag.
    pub async fn start(&self) -> Result<()> {
        self.camera.open().await?;

        let was_active = self.active.send_replace(true);
        if !was_active {
            // Fresh session: install the default so stale numbers from a
            // previous run are never reported as current.
            self.metrics.reset(self.confidence().await).await;
            tracing::info!("stream activated");
        } else {
            tracing::debug!("start requested while already active");
        }
        Ok(())
    }

    /// Mark the stream inactive and release the camera. Idempotent; safe to
    /// call with no active session.
    pub async fn stop(&self) {
        let was_active = self.active.send_replace(false);
        self.camera.close().await;
        if was_active {
            tracing::info!("stream stopped");
        }
    }

    /// Loop-side transition after a failed read: the device is gone, so the
    /// flag drops and the handle is released. A later start reopens cleanly.
    pub(crate) async fn mark_read_failure(&self) {
        self.active.send_replace(false);
        self.camera.close().await;
        tracing::warn!("stream deactivated after read failure");
    }

    /// Current confidence threshold
    pub async fn confidence(&self) -> f32 {
        *self.confidence.read().await
    }

    /// Update the confidence threshold.
    ///
    /// Policy: values above 1.0 clamp to 1.0; non-finite or non-positive
    /// values are rejected and the prior threshold is retained. The new value
    /// applies from the next detection call, not any in-flight one.
    pub async fn set_confidence(&self, value: f64) -> Result<f32> {
        if !value.is_finite() || value <= 0.0 {
            return Err(Error::Validation(format!(
                "confidence must be in (0, 1], got {value}"
            )));
        }

        let clamped = value.min(1.0) as f32;
        *self.confidence.write().await = clamped;
        tracing::info!(confidence = clamped, "confidence threshold updated");
        Ok(clamped)
    }

    /// One-shot capture: read a frame, detect once, overlay, persist.
    ///
    /// The read goes through the same camera lock as the stream loop, so the
    /// two paths never interleave on the device. Nothing is written unless
    /// the whole pipeline succeeds.
    pub async fn capture_frame(&self) -> Result<String> {
        if !self.camera.is_open().await {
            return Err(Error::CameraInactive(
                "start the camera before capturing".to_string(),
            ));
        }

        let frame = self.camera.read_frame().await?;
        let confidence = self.confidence().await;
        let detections = self.detector.detect(&frame, confidence).await?;
        let annotated = detect::render(&frame, &detections.boxes, self.jpeg_quality)?;
        let filename = self.frames.save_capture(&annotated).await?;

        tracing::info!(
            filename = %filename,
            objects = detections.total(),
            "frame captured"
        );
        Ok(filename)
    }

    /// Construct the per-request session driving the live loop. Requires an
    /// active stream; each terminated session is gone for good and a new one
    /// must be constructed here.
    pub fn open_session(self: &Arc<Self>) -> Result<StreamSession> {
        if !self.is_active() {
            return Err(Error::CameraInactive(
                "stream is not active, call start first".to_string(),
            ));
        }
        Ok(StreamSession::new(self.clone()))
    }
}
