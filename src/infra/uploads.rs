//! Filesystem storage for post image attachments.
//!
//! Attachments live under the configured uploads root, namespaced by the
//! owning post's id (`posts/<post-id>/<name>`), and are read back with a
//! traversal check so stored paths can be embedded in URLs safely.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
}

/// Result of storing an attachment payload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub stored_path: String,
    pub checksum: String,
    pub size_bytes: i64,
}

/// Filesystem-backed attachment storage.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Store an image payload under the owning post's namespace.
    pub async fn store_image(
        &self,
        post_id: Uuid,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredUpload, UploadStorageError> {
        if bytes.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }

        let stored_path = build_stored_path(post_id, original_name);
        let absolute = self.resolve(&stored_path)?;

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        let checksum = hex::encode(Sha256::digest(bytes));
        let size_bytes = i64::try_from(bytes.len()).unwrap_or(i64::MAX);

        Ok(StoredUpload {
            stored_path,
            checksum,
            size_bytes,
        })
    }

    /// Read a stored attachment back by its stored path.
    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        Ok(Bytes::from(fs::read(absolute).await?))
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

fn build_stored_path(post_id: Uuid, original_name: &str) -> String {
    let name = Path::new(original_name);
    let stem = name
        .file_stem()
        .and_then(OsStr::to_str)
        .map(slugify)
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "image".to_string());
    let extension = name
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|ch| ch.is_ascii_alphanumeric()));

    match extension {
        Some(extension) => format!("posts/{post_id}/{stem}.{extension}"),
        None => format!("posts/{post_id}/{stem}"),
    }
}
