use crate::database::DbError;
use crate::storage::StorageError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use color_eyre::eyre;
use common_types::ContactError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum GuestError {
    #[error("A guest needs a non-empty name.")]
    EmptyName,

    #[error("Invalid phone number: {0}")]
    InvalidContact(#[from] ContactError),

    #[error("Registration needs at least one photo.")]
    NoSnapshots,

    #[error("No usable face was found in any of the submitted photos.")]
    NoUsableFace,

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    #[error("Guest not found: {0}")]
    GuestNotFound(i64),

    #[error("storage failed")]
    Storage(#[from] StorageError),

    #[error("database error")]
    Database(#[from] DbError),

    #[error("internal error")]
    Internal(#[from] eyre::Report),
}

fn log_error(error: &GuestError) {
    match error {
        GuestError::Storage(e) => error!("Object storage failed: {}", e),
        GuestError::Database(e) => error!("Database query failed: {}", e),
        GuestError::Internal(e) => error!("Internal error: {}", e),
        _ => {}
    }
}

impl IntoResponse for GuestError {
    fn into_response(self) -> Response {
        log_error(&self);

        let (status, error_message) = match self {
            Self::EmptyName
            | Self::InvalidContact(_)
            | Self::NoSnapshots
            | Self::NoUsableFace
            | Self::Multipart(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::GuestNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Storage(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "The photos could not be stored, try again later.".to_string(),
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

impl From<tokio::task::JoinError> for GuestError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(eyre::Report::new(err))
    }
}
