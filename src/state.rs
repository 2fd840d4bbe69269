//! Application state
//!
//! Holds configuration and the shared components injected into handlers

use crate::detect::Detector;
use crate::storage::FrameStore;
use crate::stream::StreamController;
use std::path::PathBuf;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Capture device path (V4L2)
    pub device: String,
    /// Capture width in pixels
    pub frame_width: u32,
    /// Capture height in pixels
    pub frame_height: u32,
    /// Capture rate in frames per second
    pub frame_rate: u32,
    /// Inference server base URL
    pub detector_url: String,
    /// Inference backend selector ("remote" or "stub")
    pub detector_backend: String,
    /// Initial confidence threshold
    pub default_confidence: f32,
    /// JPEG quality for emitted frames (1-100)
    pub jpeg_quality: u8,
    /// Directory for captured stream frames
    pub saved_frames_dir: PathBuf,
    /// Directory for uploaded images
    pub uploads_dir: PathBuf,
    /// Directory served as the dashboard frontend
    pub static_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            device: std::env::var("CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            frame_width: std::env::var("FRAME_WIDTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1280),
            frame_height: std::env::var("FRAME_HEIGHT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(720),
            frame_rate: std::env::var("FRAME_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            detector_url: std::env::var("DETECTOR_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:9000".to_string()),
            detector_backend: std::env::var("DETECTOR_BACKEND")
                .unwrap_or_else(|_| "remote".to_string()),
            default_confidence: std::env::var("DEFAULT_CONFIDENCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.3),
            jpeg_quality: std::env::var("JPEG_QUALITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(80),
            saved_frames_dir: std::env::var("SAVED_FRAMES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static/saved_frames")),
            uploads_dir: std::env::var("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static/uploads")),
            static_dir: std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// StreamController (camera lifecycle, confidence, metrics, capture)
    pub controller: Arc<StreamController>,
    /// Detector (used directly by the upload path)
    pub detector: Arc<dyn Detector>,
    /// FrameStore (saved frames / uploads)
    pub frames: Arc<FrameStore>,
}
