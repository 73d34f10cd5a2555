use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings exactly as they appear in `config/settings.yaml` (after env overrides).
#[derive(Debug, Deserialize, Clone)]
pub struct RawSettings {
    pub logging: LoggingSettings,
    pub api: ApiSettings,
    pub database: DatabaseSettings,
    pub secrets: SecretSettings,
    pub matching: MatchingSettings,
    pub detection: DetectionSettings,
    pub storage: RawStorageSettings,
    pub messaging: RawMessagingSettings,
}

/// Logging configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Configuration for the API server.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    pub host: String,
    pub port: u32,
    pub allowed_origins: Vec<String>,
    pub public_url: String,
    /// Upper bound for a single multipart request body.
    pub max_upload_bytes: usize,
}

/// Database connection pool configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    /// Keep the identity store in process memory instead of Postgres.
    #[serde(default)]
    pub in_memory: bool,
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: u64,
    pub idle_timeout: u64,
    pub acquire_timeout: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecretSettings {
    pub database_url: String,
}

/// Distances are Euclidean between unit-length embeddings.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct MatchingSettings {
    /// Dimensionality every embedding must have.
    pub embedding_dimensions: usize,
    /// Max distance to link a freshly uploaded face to a known person.
    pub association_threshold: f32,
    /// Max distance to extend a manually given name to unlabeled faces.
    pub propagation_threshold: f32,
    /// Max distance for a guest selfie to match a face in a photo.
    pub search_threshold: f32,
    /// Max number of photos returned by a selfie search.
    pub search_limit: usize,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            embedding_dimensions: 512,
            association_threshold: 0.6,
            propagation_threshold: 0.75,
            search_threshold: 0.6,
            search_limit: 100,
        }
    }
}

/// Unit convention of bounding boxes returned by the detection service.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoxUnits {
    Pixels,
    Fraction,
}

/// External face detection service.
#[derive(Debug, Deserialize, Clone)]
pub struct DetectionSettings {
    pub url: String,
    pub timeout_secs: u64,
    pub box_units: BoxUnits,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RawStorageSettings {
    /// Folder that receives uploaded photo artifacts.
    pub root: PathBuf,
    /// Public URL under which `root` is served.
    pub public_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RawMessagingSettings {
    pub enabled: bool,
    pub bridge_url: String,
    pub credentials_path: PathBuf,
    /// Supports the `{name}` and `{url}` placeholders.
    pub message_template: String,
    pub backoff: BackoffSettings,
}

/// Capped exponential reconnect backoff.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct BackoffSettings {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
}
