use crate::api_state::ApiContext;
use axum::Json;
use axum::extract::State;
use common_services::api::messaging::error::MessagingApiError;
use common_services::api::messaging::interfaces::{PairingResponse, RequestPairingResponse};
use common_services::api::messaging::service::{pairing_status, request_pairing};
use common_services::messaging::SessionState;

/// Current pairing challenge of the messaging session, with a scannable QR code.
///
/// # Errors
///
/// Returns a `MessagingApiError` if the QR code cannot be rendered.
#[utoipa::path(
    get,
    path = "/messaging/pairing",
    tag = "Messaging",
    responses(
        (status = 200, description = "Session state and pairing challenge, if any.", body = PairingResponse),
        (status = 500, description = "The QR code could not be rendered."),
    )
)]
pub async fn pairing_handler(
    State(context): State<ApiContext>,
) -> Result<Json<PairingResponse>, MessagingApiError> {
    Ok(Json(pairing_status(context.messaging())?))
}

/// Ask for a fresh pairing after the session was logged out.
#[utoipa::path(
    post,
    path = "/messaging/pairing",
    tag = "Messaging",
    responses(
        (status = 200, description = "Whether a new pairing was started.", body = RequestPairingResponse),
    )
)]
pub async fn request_pairing_handler(
    State(context): State<ApiContext>,
) -> Json<RequestPairingResponse> {
    Json(request_pairing(context.messaging()))
}

#[utoipa::path(
    get,
    path = "/messaging/status",
    tag = "Messaging",
    responses(
        (status = 200, description = "State of the messaging session.", body = SessionState),
    )
)]
pub async fn status_handler(State(context): State<ApiContext>) -> Json<SessionState> {
    Json(context.messaging().state())
}
