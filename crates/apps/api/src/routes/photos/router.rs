use crate::api_state::ApiContext;
use crate::photos::handlers::{
    delete_photo_handler, list_photos_handler, photo_faces_handler, upload_photo_handler,
};
use axum::{
    Router,
    routing::{delete, get, post},
};

pub fn photos_router() -> Router<ApiContext> {
    Router::new()
        .route("/upload", post(upload_photo_handler))
        .route("/photos", get(list_photos_handler))
        .route("/photos/{photo_id}/faces", get(photo_faces_handler))
        .route("/photo/{photo_id}", delete(delete_photo_handler))
}
