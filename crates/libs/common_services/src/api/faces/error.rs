use crate::autotag::AutoTagError;
use crate::database::DbError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use color_eyre::eyre;
use common_types::ContactError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum FaceError {
    #[error("A face needs a non-empty name.")]
    EmptyName,

    #[error("Invalid phone number: {0}")]
    InvalidContact(#[from] ContactError),

    #[error("Face not found: {0}")]
    FaceNotFound(i64),

    #[error("Photo not found: {0}")]
    PhotoNotFound(i64),

    #[error("More than one person is named {0:?}; add a phone number to pick one.")]
    AmbiguousName(String),

    #[error("naming failed")]
    Database(#[from] DbError),

    #[error("internal error")]
    Internal(#[from] eyre::Report),
}

fn log_error(error: &FaceError) {
    match error {
        FaceError::Database(e) => error!("Naming failed in the database: {}", e),
        FaceError::Internal(e) => error!("Internal error: {}", e),
        _ => {}
    }
}

impl IntoResponse for FaceError {
    fn into_response(self) -> Response {
        log_error(&self);

        let (status, error_message) = match self {
            Self::EmptyName | Self::InvalidContact(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::FaceNotFound(_) | Self::PhotoNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::AmbiguousName(_) => (StatusCode::CONFLICT, self.to_string()),
            Self::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Naming failed; nothing was changed.".to_string(),
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

impl From<tokio::task::JoinError> for FaceError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(eyre::Report::new(err))
    }
}

impl From<AutoTagError> for FaceError {
    fn from(err: AutoTagError) -> Self {
        match err {
            AutoTagError::EmptyName => Self::EmptyName,
            AutoTagError::FaceNotFound(id) => Self::FaceNotFound(id),
            AutoTagError::AmbiguousName(name) => Self::AmbiguousName(name),
            AutoTagError::Database(e) => Self::Database(e),
        }
    }
}
