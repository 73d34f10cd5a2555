use crate::api_state::ApiContext;
use crate::guests::handlers::{
    delete_guest_handler, list_guests_handler, register_handler, upsert_guest_handler,
    upsert_guests_bulk_handler,
};
use axum::{
    Router,
    routing::{delete, get, post},
};

pub fn guests_router() -> Router<ApiContext> {
    Router::new()
        .route("/guests", get(list_guests_handler))
        .route("/upsert-guest", post(upsert_guest_handler))
        .route("/upsert-guests-bulk", post(upsert_guests_bulk_handler))
        .route("/guest/{person_id}", delete(delete_guest_handler))
        .route("/register", post(register_handler))
}
