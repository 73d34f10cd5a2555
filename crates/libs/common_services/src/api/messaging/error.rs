use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum MessagingApiError {
    #[error("pairing challenge cannot be rendered: {0}")]
    QrCode(#[from] qrcode::types::QrError),
}

impl IntoResponse for MessagingApiError {
    fn into_response(self) -> Response {
        error!("Messaging endpoint failed: {}", self);
        let body = Json(json!({ "error": "An unexpected internal error occurred." }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
