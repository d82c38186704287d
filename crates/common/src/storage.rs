//! Media storage for cached remote avatars and header images.
//!
//! Files are content-addressed by MD5 so the same remote image fetched for
//! many actors is written once.

use std::path::PathBuf;

use crate::{AppError, AppResult, config::StorageConfig};

/// A file written to a [`MediaStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    /// Storage key (relative path).
    pub key: String,
    /// Public URL to access the file.
    pub url: String,
    pub size: u64,
    pub content_type: String,
    pub md5: String,
}

/// Storage backend trait.
#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    /// Store a file, returning its location.
    async fn store(&self, data: &[u8], content_type: &str) -> AppResult<StoredMedia>;

    /// Delete a file. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Public URL for a key.
    fn public_url(&self, key: &str) -> String;
}

/// Local filesystem storage backend.
pub struct LocalMediaStore {
    base_path: PathBuf,
    base_url: String,
}

impl LocalMediaStore {
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
        }
    }

    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(PathBuf::from(&config.base_path), config.base_url.clone())
    }
}

#[async_trait::async_trait]
impl MediaStore for LocalMediaStore {
    async fn store(&self, data: &[u8], content_type: &str) -> AppResult<StoredMedia> {
        let md5 = format!("{:x}", md5::compute(data));
        let key = format!("remote/{md5}.{}", extension_for(content_type));
        let path = self.base_path.join(&key);

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| AppError::Internal(format!("Failed to create directory: {e}")))?;
            }
            tokio::fs::write(&path, data)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to write file: {e}")))?;
        }

        Ok(StoredMedia {
            url: self.public_url(&key),
            key,
            size: data.len() as u64,
            content_type: content_type.to_string(),
            md5,
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        match tokio::fs::remove_file(self.base_path.join(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Internal(format!("Failed to delete file: {e}"))),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/avif" => "avif",
        _ => "bin",
    }
}
