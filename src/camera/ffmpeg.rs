//! ffmpeg-backed frame source
//!
//! Spawns a long-lived ffmpeg child that demuxes the capture device into an
//! MJPEG pipe, and splits individual JPEG frames out of buffered stdout.
//! kill_on_drop(true) guarantees the child never outlives the handle, even
//! when the owning task is cancelled mid-read.

use super::{FrameSource, SourceFactory};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

/// JPEG start-of-image marker
const SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Upper bound on buffered pipe data while hunting for a frame boundary.
/// A stream that exceeds this without producing a full frame is broken.
const MAX_BUFFER_BYTES: usize = 8 * 1024 * 1024;

/// Read size per pipe poll
const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Capture parameters for the ffmpeg child
#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    /// V4L2 device path
    pub device: String,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Requested capture rate
    pub frame_rate: u32,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 1280,
            height: 720,
            frame_rate: 15,
        }
    }
}

/// Factory spawning one ffmpeg child per open
pub struct FfmpegFactory {
    config: FfmpegConfig,
}

impl FfmpegFactory {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SourceFactory for FfmpegFactory {
    async fn open(&self) -> Result<Box<dyn FrameSource>> {
        // -f v4l2: read the capture device directly
        // -f image2pipe -vcodec mjpeg: emit concatenated JPEGs on stdout
        let mut child = Command::new("ffmpeg")
            .args([
                "-f",
                "v4l2",
                "-framerate",
                &self.config.frame_rate.to_string(),
                "-video_size",
                &format!("{}x{}", self.config.width, self.config.height),
                "-i",
                &self.config.device,
                "-f",
                "image2pipe",
                "-vcodec",
                "mjpeg",
                "-q:v",
                "5",
                "-loglevel",
                "error",
                "-",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::DeviceUnavailable(format!("ffmpeg spawn failed: {e}")))?;

        // A bad device makes ffmpeg exit immediately; catch that here so the
        // caller gets a start-time error instead of a first-read failure.
        tokio::time::sleep(Duration::from_millis(150)).await;
        if let Ok(Some(status)) = child.try_wait() {
            return Err(Error::DeviceUnavailable(format!(
                "ffmpeg exited on startup ({status}) for {}",
                self.config.device
            )));
        }

        let stdout = child.stdout.take().ok_or_else(|| {
            Error::DeviceUnavailable("ffmpeg spawned without stdout pipe".to_string())
        })?;

        tracing::info!(
            device = %self.config.device,
            width = self.config.width,
            height = self.config.height,
            frame_rate = self.config.frame_rate,
            "ffmpeg capture started"
        );

        Ok(Box::new(FfmpegSource {
            child,
            stdout,
            buf: Vec::with_capacity(READ_CHUNK_BYTES),
        }))
    }
}

struct FfmpegSource {
    child: Child,
    stdout: ChildStdout,
    buf: Vec<u8>,
}

#[async_trait]
impl FrameSource for FfmpegSource {
    async fn next_frame(&mut self) -> Result<Vec<u8>> {
        loop {
            if let Some(frame) = extract_jpeg(&mut self.buf) {
                return Ok(frame);
            }

            if self.buf.len() > MAX_BUFFER_BYTES {
                return Err(Error::ReadFailed(
                    "no frame boundary within buffer limit".to_string(),
                ));
            }

            self.buf.reserve(READ_CHUNK_BYTES);
            let n = self
                .stdout
                .read_buf(&mut self.buf)
                .await
                .map_err(|e| Error::ReadFailed(format!("capture pipe error: {e}")))?;

            if n == 0 {
                return Err(Error::ReadFailed("capture pipe closed".to_string()));
            }
        }
    }

    async fn shutdown(&mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
        self.buf.clear();
    }
}

/// Split the first complete JPEG (SOI..=EOI) out of the buffer.
///
/// Leading bytes before the SOI are discarded; when no SOI is present the
/// buffer is trimmed to one trailing byte in case it holds half a marker.
fn extract_jpeg(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    let soi = match find_marker(buf, &SOI) {
        Some(pos) => pos,
        None => {
            if buf.len() > 1 {
                buf.drain(..buf.len() - 1);
            }
            return None;
        }
    };

    if soi > 0 {
        buf.drain(..soi);
    }

    let eoi = find_marker(&buf[SOI.len()..], &EOI)? + SOI.len();
    let end = eoi + EOI.len();
    let frame = buf[..end].to_vec();
    buf.drain(..end);
    Some(frame)
}

fn find_marker(haystack: &[u8], marker: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}
