use crate::routes::{faces, guests, live, messaging, photos, root, search};
use common_services::api::upload::interfaces::NotificationSummary;
use common_services::notify::LiveEvent;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        root::handlers::root,
        root::handlers::health_check,
        // Photos handlers
        photos::handlers::upload_photo_handler,
        photos::handlers::list_photos_handler,
        photos::handlers::photo_faces_handler,
        photos::handlers::delete_photo_handler,
        // Guest handlers
        guests::handlers::list_guests_handler,
        guests::handlers::upsert_guest_handler,
        guests::handlers::upsert_guests_bulk_handler,
        guests::handlers::delete_guest_handler,
        guests::handlers::register_handler,
        // Face handlers
        faces::handlers::name_face_handler,
        // Search handlers
        search::handlers::search_handler,
        // Messaging handlers
        messaging::handlers::pairing_handler,
        messaging::handlers::request_pairing_handler,
        messaging::handlers::status_handler,
        // Live channel
        live::handlers::live_websocket_handler,
    ),
    components(
        schemas(
            LiveEvent,
            NotificationSummary,
        ),
    ),
    tags(
        (name = "Event Photos", description = "Event photo sharing API"),
        (name = "Photos", description = "Upload, list and delete event photos"),
        (name = "Guests", description = "Guest roster and self-registration"),
        (name = "Faces", description = "Naming faces and spreading names"),
        (name = "Search", description = "Find photos with a selfie"),
        (name = "Messaging", description = "Chat session pairing and status"),
        (name = "Live", description = "Live updates over websocket"),
        (name = "System", description = "Health check"),
    )
)]
pub struct ApiDoc;
