use super::error::StorageError;
use app_state::StorageSettings;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// A blob that was written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// Durable blob storage for photo artifacts.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` under a fresh key ending in `extension` and returns its public URL.
    async fn put(&self, bytes: &[u8], extension: &str) -> Result<StoredObject, StorageError>;

    /// Removes an object. Deleting a key that is already gone succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// File extension for an uploaded artifact, from its file name or else its content type.
#[must_use]
pub fn extension_for(file_name: Option<&str>, content_type: Option<&str>) -> String {
    let from_name = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return ext;
    }
    content_type
        .and_then(mime_guess::get_mime_extensions_str)
        .and_then(|exts| exts.first())
        .map_or_else(|| "bin".to_owned(), |ext| (*ext).to_owned())
}

/// Stores artifacts as files in one folder that the API serves under `public_url`.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalObjectStorage {
    #[must_use]
    pub fn new(settings: &StorageSettings) -> Self {
        Self {
            root: settings.root.clone(),
            public_url: settings.public_url.clone(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn put(&self, bytes: &[u8], extension: &str) -> Result<StoredObject, StorageError> {
        let key = format!("{}.{extension}", Uuid::new_v4());
        let path = self.path_for(&key)?;
        fs::create_dir_all(&self.root).await?;

        // Write under a temporary name so a half-written file is never served.
        let partial = self.root.join(format!(".{key}.partial"));
        fs::write(&partial, bytes).await?;
        fs::rename(&partial, &path).await?;

        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(StoredObject {
            url: format!("{}/{key}", self.public_url),
            key,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
