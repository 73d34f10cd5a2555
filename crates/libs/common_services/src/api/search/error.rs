use crate::database::DbError;
use crate::detection::DetectionError;
use crate::matching::MatchError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use color_eyre::eyre;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("The request has no `selfie` file.")]
    MissingSelfie,

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    #[error("No face was found in the selfie.")]
    NoFaceFound,

    #[error("The selfie shows {0} faces; please send a photo of just yourself.")]
    MultipleFaces(usize),

    #[error("face detection failed")]
    Detection(#[from] DetectionError),

    #[error("database error")]
    Database(#[from] DbError),

    #[error("internal error")]
    Internal(#[from] eyre::Report),
}

fn log_error(error: &SearchError) {
    match error {
        SearchError::Detection(e) => error!("Detection service failed: {}", e),
        SearchError::Database(e) => error!("Database query failed: {}", e),
        SearchError::Internal(e) => error!("Internal error: {}", e),
        _ => {}
    }
}

impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        log_error(&self);

        let (status, error_message) = match self {
            Self::MissingSelfie | Self::Multipart(_) | Self::NoFaceFound | Self::MultipleFaces(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::Detection(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Face detection is unavailable, try again later.".to_string(),
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

impl From<MatchError> for SearchError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::NoFaceFound => Self::NoFaceFound,
            MatchError::MultipleFaces(n) => Self::MultipleFaces(n),
            MatchError::Database(e) => Self::Database(e),
        }
    }
}
