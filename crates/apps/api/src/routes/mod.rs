mod api_doc;
pub mod faces;
pub mod guests;
pub mod live;
pub mod messaging;
mod multipart;
pub mod photos;
pub mod root;
pub mod search;

use crate::api_state::ApiContext;
use crate::faces::router::faces_router;
use crate::guests::router::guests_router;
use crate::live::router::live_router;
use crate::messaging::router::messaging_router;
use crate::photos::router::photos_router;
use crate::root::router::root_router;
use crate::routes::api_doc::ApiDoc;
use crate::search::router::search_router;
use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// --- Router Construction ---
pub fn create_router(api_state: ApiContext) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .merge(root_router())
        .merge(photos_router())
        .merge(guests_router())
        .merge(faces_router())
        .merge(search_router())
        .merge(messaging_router())
        .merge(live_router())
        .with_state(api_state)
}
