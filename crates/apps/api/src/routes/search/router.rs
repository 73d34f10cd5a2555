use crate::api_state::ApiContext;
use crate::search::handlers::search_handler;
use axum::{Router, routing::post};

pub fn search_router() -> Router<ApiContext> {
    Router::new().route("/search", post(search_handler))
}
