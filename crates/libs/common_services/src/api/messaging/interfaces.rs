use crate::messaging::SessionState;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PairingResponse {
    pub session: SessionState,
    /// Raw challenge, present only while pairing.
    pub challenge: Option<String>,
    /// The challenge rendered as an SVG QR code.
    pub qr_svg: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestPairingResponse {
    /// `false` when the session was not logged out, so no new pairing was started.
    pub accepted: bool,
    pub session: SessionState,
}
