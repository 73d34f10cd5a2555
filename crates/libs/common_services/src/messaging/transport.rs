use crate::messaging::TransportError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Opaque session credentials issued by the chat network after pairing.
pub type Credentials = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The account was logged out remotely. Stored credentials are dead.
    LoggedOut,
    ConnectionLost(String),
}

/// What the chat network tells a live connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A pairing code to show to the operator, usually rendered as a QR code.
    PairingChallenge(String),
    CredentialsUpdated(Credentials),
    Open,
    Closed(DisconnectReason),
}

/// Writes messages onto one connection.
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send_text(&self, to: &str, text: &str) -> Result<(), TransportError>;
}

/// One connection attempt. `events` ends when the connection is gone.
pub struct TransportLink {
    pub events: mpsc::Receiver<TransportEvent>,
    pub sender: Arc<dyn ChatSender>,
}

/// Entry point to an external chat network.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Connects, resuming with `credentials` or asking for a pairing challenge when `None`.
    async fn connect(&self, credentials: Option<Credentials>) -> Result<TransportLink, TransportError>;
}
