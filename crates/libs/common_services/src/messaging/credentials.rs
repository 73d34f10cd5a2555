use crate::messaging::{Credentials, MessagingError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

/// Keeps the chat session credentials in one JSON file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored credentials, or `None` when the file is missing or unreadable.
    pub async fn load(&self) -> Option<Credentials> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cannot read credentials at {}: {e}", self.path.display());
                return None;
            }
        };
        match serde_json::from_slice::<Credentials>(&raw) {
            Ok(credentials) if !credentials.is_null() => Some(credentials),
            Ok(_) => None,
            Err(e) => {
                warn!("Ignoring invalid credentials at {}: {e}", self.path.display());
                None
            }
        }
    }

    /// Replaces the stored credentials atomically: a crash leaves either the old or
    /// the new file, never a torn one.
    pub async fn save(&self, credentials: &Credentials) -> Result<(), MessagingError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp = self.path.with_extension("tmp");
        fs::write(&temp, serde_json::to_vec_pretty(credentials)?).await?;
        fs::rename(&temp, &self.path).await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), MessagingError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn save_load_clear() {
        let dir = tempdir().expect("tempdir");
        let store = FileCredentialStore::new(dir.path().join("session").join("creds.json"));
        assert!(store.load().await.is_none());

        let credentials = json!({"token": "abc", "device": 3});
        store.save(&credentials).await.expect("save");
        assert_eq!(store.load().await, Some(credentials));
        assert!(!store.path().with_extension("tmp").exists());

        store.clear().await.expect("clear");
        assert!(store.load().await.is_none());
        store.clear().await.expect("clearing twice is fine");
    }

    #[tokio::test]
    async fn corrupt_file_counts_as_missing() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("creds.json");
        fs::write(&path, b"{not json").await.expect("write");

        assert!(FileCredentialStore::new(path).load().await.is_none());
    }
}
