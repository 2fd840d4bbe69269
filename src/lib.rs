//! Camwatch - Live Object-Detection Streaming Server
//!
//! ## Architecture (7 components)
//!
//! 1. CameraResource - exclusive capture handle, serialized frame reads
//! 2. Detector - inference backend seam (remote HTTP server / stub)
//! 3. MetricsStore - latest detection metrics snapshot
//! 4. StreamController - lifecycle, confidence threshold, one-shot capture
//! 5. StreamSession - pull / detect / publish / emit loop
//! 6. FrameStore - saved frame and upload persistence
//! 7. WebAPI - REST endpoints + multipart video stream
//!
//! ## Design Principles
//!
//! - One camera handle process-wide; every read goes through the handle lock
//! - Cooperative cancellation via a watch channel polled each loop iteration
//! - Last-write-wins metrics; pollers observe eventual consistency

pub mod camera;
pub mod detect;
pub mod error;
pub mod metrics;
pub mod state;
pub mod storage;
pub mod stream;
pub mod web_api;
