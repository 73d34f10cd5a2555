use crate::messaging::SessionState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Malformed bridge frame: {0}")]
    Frame(#[from] serde_json::Error),

    #[error("Connection is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Messaging session is not connected (state: {0})")]
    NotConnected(SessionState),

    #[error("Message could not be delivered: {0}")]
    Transport(#[from] TransportError),

    #[error("Credential storage failed: {0}")]
    Credentials(#[from] std::io::Error),

    #[error("Credentials could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
}
