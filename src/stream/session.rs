//! StreamSession - the live pull / detect / publish / emit loop
//!
//! One session per attached client. The loop runs until the cancellation
//! signal drops, a frame read fails, or an iteration's detection/encoding
//! fails; a terminated session is not restartable.

use super::StreamController;
use crate::detect;
use crate::metrics::MetricsSnapshot;
use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Content type of the emitted multipart stream
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Per-chunk framing: boundary, part header, blank line, payload, separator
const CHUNK_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
const CHUNK_TRAILER: &[u8] = b"\r\n";

pub struct StreamSession {
    controller: Arc<StreamController>,
    active: watch::Receiver<bool>,
}

impl StreamSession {
    pub(super) fn new(controller: Arc<StreamController>) -> Self {
        let active = controller.subscribe();
        Self { controller, active }
    }

    /// Consume the session into the multipart byte stream.
    ///
    /// Each iteration: poll the cancellation flag, read one frame, measure
    /// fps against the previous iteration, detect at the current threshold,
    /// publish metrics, then emit the annotated frame as one chunk. The
    /// metrics publish is a side effect visible to pollers independent of
    /// the chunk; a poll may run slightly ahead of what a viewer sees.
    pub fn into_byte_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> {
        let Self { controller, active } = self;

        stream! {
            let mut last_frame_at: Option<Instant> = None;

            loop {
                if !*active.borrow() {
                    tracing::debug!("session cancelled");
                    break;
                }

                // Hard stop on a failed read: the device is gone, and the
                // control surface owns recovery by re-issuing start.
                let frame = match controller.camera.read_frame().await {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(error = %e, "frame read failed, ending session");
                        controller.mark_read_failure().await;
                        break;
                    }
                };

                let now = Instant::now();
                let fps = match last_frame_at {
                    Some(prev) => {
                        let elapsed = now.duration_since(prev).as_secs_f64();
                        if elapsed > 0.0 { 1.0 / elapsed } else { 0.0 }
                    }
                    // No previous iteration to measure against
                    None => 0.0,
                };
                last_frame_at = Some(now);

                let confidence = controller.confidence().await;
                let detections = match controller.detector.detect(&frame, confidence).await {
                    Ok(detections) => detections,
                    Err(e) => {
                        tracing::error!(error = %e, "inference failed, ending session");
                        break;
                    }
                };

                controller
                    .metrics
                    .publish(MetricsSnapshot {
                        fps,
                        confidence,
                        object_count: detections.total(),
                        detections: detections.class_counts(),
                    })
                    .await;

                let annotated =
                    match detect::render(&frame, &detections.boxes, controller.jpeg_quality) {
                        Ok(annotated) => annotated,
                        Err(e) => {
                            tracing::error!(error = %e, "frame encode failed, ending session");
                            break;
                        }
                    };

                yield Ok::<Bytes, Infallible>(encode_chunk(&annotated));
            }

            tracing::debug!("session ended");
        }
    }
}

fn encode_chunk(jpeg: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(CHUNK_HEADER.len() + jpeg.len() + CHUNK_TRAILER.len());
    out.extend_from_slice(CHUNK_HEADER);
    out.extend_from_slice(jpeg);
    out.extend_from_slice(CHUNK_TRAILER);
    Bytes::from(out)
}
