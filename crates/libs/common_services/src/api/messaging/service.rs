use crate::api::messaging::error::MessagingApiError;
use crate::api::messaging::interfaces::{PairingResponse, RequestPairingResponse};
use crate::messaging::{MessagingSession, SessionState};
use qrcode::QrCode;
use qrcode::render::svg;
use tracing::info;

pub fn render_qr_svg(challenge: &str) -> Result<String, MessagingApiError> {
    let code = QrCode::new(challenge.as_bytes())?;
    Ok(code
        .render::<svg::Color<'_>>()
        .min_dimensions(256, 256)
        .quiet_zone(true)
        .build())
}

/// Current pairing challenge, or just the state when there is nothing to scan.
pub fn pairing_status(session: &MessagingSession) -> Result<PairingResponse, MessagingApiError> {
    let state = session.state();
    let challenge = match &state {
        SessionState::Pairing { challenge } => challenge.clone(),
        _ => None,
    };
    let qr_svg = challenge.as_deref().map(render_qr_svg).transpose()?;
    Ok(PairingResponse {
        session: state,
        challenge,
        qr_svg,
    })
}

pub fn request_pairing(session: &MessagingSession) -> RequestPairingResponse {
    let accepted = session.request_pairing();
    if accepted {
        info!("Operator requested fresh messaging pairing");
    }
    RequestPairingResponse {
        accepted,
        session: session.state(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_svg() {
        let svg = render_qr_svg("2@abc,def,ghi").expect("renderable");
        assert!(svg.contains("<svg"));
    }
}
