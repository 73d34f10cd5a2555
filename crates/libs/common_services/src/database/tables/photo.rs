use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::Type, ToSchema, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "photo_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhotoStatus {
    Pending,
    Completed,
    /// Registration snapshot. Used as match source data, never listed as an event photo.
    Reference,
}

/// Corresponds to the 'photo' table.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: i64,
    pub url: String,
    #[serde(skip)]
    pub storage_key: String,
    pub original_url: Option<String>,
    #[serde(skip)]
    pub original_storage_key: Option<String>,
    pub status: PhotoStatus,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Photo {
    /// Storage keys of every artifact owned by this photo.
    #[must_use]
    pub fn storage_keys(&self) -> Vec<&str> {
        let mut keys = vec![self.storage_key.as_str()];
        if let Some(original) = &self.original_storage_key {
            keys.push(original);
        }
        keys
    }
}

/// A photo row that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPhoto {
    pub url: String,
    pub storage_key: String,
    pub original_url: Option<String>,
    pub original_storage_key: Option<String>,
    pub status: PhotoStatus,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// A photo together with its distance to a searched embedding.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMatch {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub photo: Photo,
    /// Distance of the closest face in this photo.
    pub distance: f32,
}
