//! FrameStore - saved frame and upload persistence
//!
//! ## Responsibilities
//!
//! - Persist annotated frames under timestamp-derived names
//! - List stored files for the dashboard galleries
//! - Sanitize requested filenames before serving them back

use crate::error::{Error, Result};
use chrono::Utc;
use std::path::PathBuf;
use tokio::fs;

/// File extensions accepted on upload
const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// FrameStore instance
pub struct FrameStore {
    saved_dir: PathBuf,
    uploads_dir: PathBuf,
}

impl FrameStore {
    /// Create the store, making both directories if needed
    pub async fn new(saved_dir: PathBuf, uploads_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&saved_dir).await?;
        fs::create_dir_all(&uploads_dir).await?;

        Ok(Self {
            saved_dir,
            uploads_dir,
        })
    }

    /// Persist a captured stream frame; returns the generated filename
    pub async fn save_capture(&self, data: &[u8]) -> Result<String> {
        let filename = timestamp_name();
        let path = self.saved_dir.join(&filename);
        fs::write(&path, data).await?;

        tracing::debug!(
            path = %path.display(),
            size = data.len(),
            "saved captured frame"
        );
        Ok(filename)
    }

    /// Persist an annotated upload; returns the generated filename
    pub async fn save_upload(&self, data: &[u8]) -> Result<String> {
        let filename = timestamp_name();
        let path = self.uploads_dir.join(&filename);
        fs::write(&path, data).await?;

        tracing::debug!(
            path = %path.display(),
            size = data.len(),
            "saved uploaded image"
        );
        Ok(filename)
    }

    /// Filenames of captured frames, newest last
    pub async fn list_saved(&self) -> Result<Vec<String>> {
        list_dir(&self.saved_dir).await
    }

    /// Filenames of stored uploads, newest last
    pub async fn list_uploads(&self) -> Result<Vec<String>> {
        list_dir(&self.uploads_dir).await
    }

    /// Path of a captured frame by filename
    pub fn saved_path(&self, filename: &str) -> Result<PathBuf> {
        Ok(self.saved_dir.join(sanitize(filename)?))
    }

    /// Path of a stored upload by filename
    pub fn upload_path(&self, filename: &str) -> Result<PathBuf> {
        Ok(self.uploads_dir.join(sanitize(filename)?))
    }

    /// Whether an uploaded filename carries an accepted image extension
    pub fn allowed_upload(filename: &str) -> bool {
        filename
            .rsplit_once('.')
            .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

fn timestamp_name() -> String {
    format!("{}.jpg", Utc::now().format("%Y%m%d_%H%M%S_%3f"))
}

async fn list_dir(dir: &PathBuf) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Reject separators and parent references so a requested filename can never
/// escape the store directory.
fn sanitize(filename: &str) -> Result<&str> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(Error::Validation(format!("invalid filename: {filename}")));
    }
    Ok(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (FrameStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::new(dir.path().join("saved"), dir.path().join("uploads"))
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn save_and_list_captures() {
        let (store, _dir) = store().await;

        let first = store.save_capture(b"frame-one").await.unwrap();
        let listed = store.list_saved().await.unwrap();

        assert_eq!(listed, vec![first.clone()]);
        assert!(first.ends_with(".jpg"));
        assert!(store.list_uploads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn uploads_are_kept_separate() {
        let (store, _dir) = store().await;

        let name = store.save_upload(b"upload").await.unwrap();
        assert_eq!(store.list_uploads().await.unwrap(), vec![name]);
        assert!(store.list_saved().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let (store, _dir) = store().await;

        assert!(store.saved_path("../escape.jpg").is_err());
        assert!(store.saved_path("a/b.jpg").is_err());
        assert!(store.upload_path("").is_err());
        assert!(store.saved_path("frame.jpg").is_ok());
    }

    #[test]
    fn upload_extension_allowlist() {
        assert!(FrameStore::allowed_upload("photo.jpg"));
        assert!(FrameStore::allowed_upload("photo.JPEG"));
        assert!(FrameStore::allowed_upload("photo.png"));
        assert!(!FrameStore::allowed_upload("photo.gif"));
        assert!(!FrameStore::allowed_upload("photo"));
        assert!(!FrameStore::allowed_upload("script.sh"));
    }
}
