use crate::api_state::ApiContext;
use crate::faces::handlers::name_face_handler;
use axum::{Router, routing::post};

pub fn faces_router() -> Router<ApiContext> {
    Router::new().route("/faces/{face_id}/name", post(name_face_handler))
}
