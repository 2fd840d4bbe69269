//! CameraResource - exclusive ownership of the capture device
//!
//! ## Responsibilities
//!
//! - Single process-wide capture handle (open/close lifecycle)
//! - Serialized frame reads (one reader in flight at a time)
//! - FrameSource seam for capture backends

mod ffmpeg;

pub use ffmpeg::{FfmpegConfig, FfmpegFactory};

use crate::error::{Error, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Producer of encoded JPEG frames from an open device.
#[async_trait]
pub trait FrameSource: Send {
    /// Pull the next frame. Blocks until one is available or the device fails.
    async fn next_frame(&mut self) -> Result<Vec<u8>>;

    /// Release the underlying device.
    async fn shutdown(&mut self);
}

/// Opens a FrameSource. The production factory spawns the capture process;
/// tests substitute scripted sources.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn FrameSource>>;
}

/// CameraResource - the one capture handle in the process.
///
/// The handle lives inside a mutex that is held for the full duration of a
/// read, so the streaming loop and the one-shot capture path can never have
/// two reads in flight against the same device.
pub struct CameraResource {
    factory: Box<dyn SourceFactory>,
    handle: Mutex<Option<Box<dyn FrameSource>>>,
}

impl CameraResource {
    pub fn new(factory: Box<dyn SourceFactory>) -> Self {
        Self {
            factory,
            handle: Mutex::new(None),
        }
    }

    /// Open the device. Idempotent: an already-open handle is kept as-is.
    pub async fn open(&self) -> Result<()> {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            tracing::debug!("camera already open");
            return Ok(());
        }

        let source = self.factory.open().await?;
        *handle = Some(source);
        tracing::info!("camera opened");
        Ok(())
    }

    /// Release the device. Idempotent: closing a closed camera is a no-op.
    pub async fn close(&self) {
        let mut handle = self.handle.lock().await;
        if let Some(mut source) = handle.take() {
            source.shutdown().await;
            tracing::info!("camera closed");
        }
    }

    /// Whether the handle is currently open.
    pub async fn is_open(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    /// Read one frame. The handle lock is held across the read, serializing
    /// the streaming loop against concurrent one-shot captures.
    pub async fn read_frame(&self) -> Result<Vec<u8>> {
        let mut handle = self.handle.lock().await;
        match handle.as_mut() {
            Some(source) => source.next_frame().await,
            None => Err(Error::CameraInactive("camera is not open".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountedSource;

    #[async_trait]
    impl FrameSource for CountedSource {
        async fn next_frame(&mut self) -> Result<Vec<u8>> {
            Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
        }

        async fn shutdown(&mut self) {}
    }

    struct CountedFactory {
        opens: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SourceFactory for CountedFactory {
        async fn open(&self) -> Result<Box<dyn FrameSource>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountedSource))
        }
    }

    /// Source that flags overlapping reads.
    struct ExclusiveSource {
        in_flight: Arc<AtomicBool>,
        violations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FrameSource for ExclusiveSource {
        async fn next_frame(&mut self) -> Result<Vec<u8>> {
            if self.in_flight.swap(true, Ordering::SeqCst) {
                self.violations.fetch_add(1, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.store(false, Ordering::SeqCst);
            Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
        }

        async fn shutdown(&mut self) {}
    }

    struct ExclusiveFactory {
        in_flight: Arc<AtomicBool>,
        violations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SourceFactory for ExclusiveFactory {
        async fn open(&self) -> Result<Box<dyn FrameSource>> {
            Ok(Box::new(ExclusiveSource {
                in_flight: self.in_flight.clone(),
                violations: self.violations.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let opens = Arc::new(AtomicUsize::new(0));
        let camera = CameraResource::new(Box::new(CountedFactory {
            opens: opens.clone(),
        }));

        camera.open().await.unwrap();
        camera.open().await.unwrap();

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert!(camera.is_open().await);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let opens = Arc::new(AtomicUsize::new(0));
        let camera = CameraResource::new(Box::new(CountedFactory {
            opens: opens.clone(),
        }));

        camera.close().await;
        camera.open().await.unwrap();
        camera.close().await;
        camera.close().await;

        assert!(!camera.is_open().await);

        // Reopening after close goes back to the factory.
        camera.open().await.unwrap();
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn read_on_closed_camera_fails() {
        let camera = CameraResource::new(Box::new(CountedFactory {
            opens: Arc::new(AtomicUsize::new(0)),
        }));

        let result = camera.read_frame().await;
        assert!(matches!(result, Err(Error::CameraInactive(_))));
    }

    #[tokio::test]
    async fn concurrent_reads_are_serialized() {
        let in_flight = Arc::new(AtomicBool::new(false));
        let violations = Arc::new(AtomicUsize::new(0));
        let camera = Arc::new(CameraResource::new(Box::new(ExclusiveFactory {
            in_flight,
            violations: violations.clone(),
        })));
        camera.open().await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let camera = camera.clone();
            tasks.push(tokio::spawn(async move {
                camera.read_frame().await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(violations.load(Ordering::SeqCst), 0);
    }
}
