//! Blob storage for uploaded avatars and attachments

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{PlatformError, Result};
use crate::service::Clock;

/// Metadata of a stored upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub filename: String,
    pub original_name: String,
    pub path: String,
    pub size: u64,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, original_name: &str, data: Bytes) -> Result<StoredBlob>;

    /// `None` when no blob has this name
    async fn get(&self, filename: &str) -> Result<Option<Bytes>>;
}

/// Rejects names that could escape the storage directory
pub fn validate_filename(filename: &str) -> Result<()> {
    let invalid = filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
        || filename.contains('\0');
    if invalid {
        return Err(PlatformError::validation("invalid filename"));
    }
    Ok(())
}

/// Extension of the uploaded name, including the dot, or empty
fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

pub struct LocalDiskBlobStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl LocalDiskBlobStore {
    pub fn new(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            clock,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalDiskBlobStore {
    async fn put(&self, original_name: &str, data: Bytes) -> Result<StoredBlob> {
        tokio::fs::create_dir_all(&self.root).await?;

        let extension = extension_of(original_name);
        let mut millis = self.clock.now().timestamp_millis();
        // Claim the name with create_new so concurrent uploads never share a file
        let (filename, path, mut file) = loop {
            let filename = format!("{}{}", millis, extension);
            let path = self.root.join(&filename);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => break (filename, path, file),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => millis += 1,
                Err(e) => return Err(e.into()),
            }
        };

        file.write_all(&data).await?;
        file.flush().await?;
        info!(filename = %filename, size = data.len(), "Stored upload");

        Ok(StoredBlob {
            filename,
            original_name: original_name.to_string(),
            path: path.to_string_lossy().into_owned(),
            size: data.len() as u64,
        })
    }

    async fn get(&self, filename: &str) -> Result<Option<Bytes>> {
        validate_filename(filename)?;
        let path = self.root.join(filename);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(filename = %filename, "Upload not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
