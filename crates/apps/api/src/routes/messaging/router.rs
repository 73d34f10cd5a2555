use crate::api_state::ApiContext;
use crate::messaging::handlers::{pairing_handler, request_pairing_handler, status_handler};
use axum::{Router, routing::get};

pub fn messaging_router() -> Router<ApiContext> {
    Router::new()
        .route(
            "/messaging/pairing",
            get(pairing_handler).post(request_pairing_handler),
        )
        .route("/messaging/status", get(status_handler))
}
