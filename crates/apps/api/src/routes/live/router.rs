use crate::api_state::ApiContext;
use crate::live::handlers::live_websocket_handler;
use axum::{Router, routing::get};

pub fn live_router() -> Router<ApiContext> {
    Router::new().route("/live", get(live_websocket_handler))
}
