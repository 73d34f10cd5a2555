use crate::database::DbError;
use crate::detection::DetectionError;
use crate::matching::MatchError;
use crate::storage::StorageError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use color_eyre::eyre;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("The request has no `photo` file.")]
    MissingPhoto,

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    #[error("face detection failed")]
    Detection(#[from] DetectionError),

    #[error("storage failed")]
    Storage(#[from] StorageError),

    #[error("database error")]
    Database(#[from] DbError),

    #[error("internal error")]
    Internal(#[from] eyre::Report),
}

fn log_error(error: &UploadError) {
    match error {
        UploadError::Detection(e) => error!("Detection service failed: {}", e),
        UploadError::Storage(e) => error!("Object storage failed: {}", e),
        UploadError::Database(e) => error!("Database query failed: {}", e),
        UploadError::Internal(e) => error!("Internal error: {}", e),
        UploadError::MissingPhoto | UploadError::Multipart(_) => {}
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        log_error(&self);

        let (status, error_message) = match self {
            Self::MissingPhoto | Self::Multipart(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::Detection(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Face detection is unavailable, try again later.".to_string(),
            ),
            Self::Storage(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "The photo could not be stored, try again later.".to_string(),
            ),
            Self::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "A database error occurred.".to_string(),
            ),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected internal error occurred.".to_string(),
            ),
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl From<tokio::task::JoinError> for UploadError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(eyre::Report::new(err))
    }
}

impl From<MatchError> for UploadError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::Database(e) => Self::Database(e),
            other => Self::Internal(eyre::Report::new(other)),
        }
    }
}
