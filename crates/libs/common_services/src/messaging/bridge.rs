use crate::messaging::{
    ChatSender, ChatTransport, Credentials, DisconnectReason, TransportError, TransportEvent,
    TransportLink,
};
use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame<'a> {
    Resume { credentials: &'a Credentials },
    Pair,
    Send { to: &'a str, text: &'a str },
}

impl ClientFrame<'_> {
    fn to_message(&self) -> Result<Message, TransportError> {
        Ok(Message::Text(serde_json::to_string(self)?.into()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeFrame {
    Qr {
        code: String,
    },
    Credentials {
        credentials: Credentials,
    },
    Open,
    Close {
        reason: String,
        #[serde(default)]
        detail: Option<String>,
    },
}

impl From<BridgeFrame> for TransportEvent {
    fn from(frame: BridgeFrame) -> Self {
        match frame {
            BridgeFrame::Qr { code } => Self::PairingChallenge(code),
            BridgeFrame::Credentials { credentials } => Self::CredentialsUpdated(credentials),
            BridgeFrame::Open => Self::Open,
            BridgeFrame::Close { reason, .. } if reason == "logged_out" => {
                Self::Closed(DisconnectReason::LoggedOut)
            }
            BridgeFrame::Close { reason, detail } => Self::Closed(
                DisconnectReason::ConnectionLost(detail.unwrap_or(reason)),
            ),
        }
    }
}

fn to_event(message: Result<Message, tokio_tungstenite::tungstenite::Error>) -> Option<TransportEvent> {
    match message {
        Ok(Message::Text(text)) => match serde_json::from_str::<BridgeFrame>(&text) {
            Ok(frame) => Some(frame.into()),
            Err(e) => {
                warn!("Ignoring unknown bridge frame: {e}");
                None
            }
        },
        Ok(Message::Close(frame)) => Some(TransportEvent::Closed(
            DisconnectReason::ConnectionLost(
                frame.map_or_else(|| "closed by bridge".to_owned(), |f| f.reason.to_string()),
            ),
        )),
        Ok(_) => None,
        Err(e) => Some(TransportEvent::Closed(DisconnectReason::ConnectionLost(
            e.to_string(),
        ))),
    }
}

struct BridgeSender {
    sink: Mutex<WsSink>,
}

#[async_trait]
impl ChatSender for BridgeSender {
    async fn send_text(&self, to: &str, text: &str) -> Result<(), TransportError> {
        let message = ClientFrame::Send { to, text }.to_message()?;
        self.sink.lock().await.send(message).await?;
        Ok(())
    }
}

/// Reaches the chat network through a websocket bridge that speaks JSON frames.
#[derive(Debug, Clone)]
pub struct BridgeTransport {
    url: String,
}

impl BridgeTransport {
    #[must_use]
    pub const fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait]
impl ChatTransport for BridgeTransport {
    async fn connect(&self, credentials: Option<Credentials>) -> Result<TransportLink, TransportError> {
        let (socket, _) = connect_async(self.url.as_str()).await?;
        let (mut sink, mut stream) = socket.split();

        let hello = credentials
            .as_ref()
            .map_or(ClientFrame::Pair, |credentials| ClientFrame::Resume { credentials });
        sink.send(hello.to_message()?).await?;
        debug!("Connected to chat bridge at {}", self.url);

        let (events_tx, events) = mpsc::channel(32);
        tokio::spawn(async move {
            loop {
                // Ends as soon as the session drops the link, releasing the socket.
                let message = tokio::select! {
                    () = events_tx.closed() => break,
                    message = stream.next() => message,
                };
                let Some(message) = message else {
                    break;
                };
                let Some(event) = to_event(message) else {
                    continue;
                };
                let closing = matches!(event, TransportEvent::Closed(_));
                if events_tx.send(event).await.is_err() || closing {
                    break;
                }
            }
        });

        Ok(TransportLink {
            events,
            sender: Arc::new(BridgeSender {
                sink: Mutex::new(sink),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(frame: serde_json::Value) -> Option<TransportEvent> {
        to_event(Ok(Message::Text(frame.to_string().into())))
    }

    #[tokio::test]
    async fn dropping_the_link_closes_the_socket() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let bridge = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(tcp).await.expect("handshake");
            let hello = ws.next().await.expect("hello").expect("frame");
            assert_eq!(
                serde_json::from_str::<serde_json::Value>(hello.to_text().expect("text"))
                    .expect("json"),
                json!({"type": "pair"})
            );
            // The bridge stays silent; only the client can end the connection.
            loop {
                match ws.next().await {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
        });

        let link = BridgeTransport::new(format!("ws://{addr}"))
            .connect(None)
            .await
            .expect("connected");
        drop(link);

        tokio::time::timeout(std::time::Duration::from_secs(5), bridge)
            .await
            .expect("socket closed after the link was dropped")
            .expect("bridge task");
    }

    #[test]
    fn bridge_frames_become_events() {
        assert_eq!(
            text(json!({"type": "qr", "code": "2@xyz"})),
            Some(TransportEvent::PairingChallenge("2@xyz".into()))
        );
        assert_eq!(
            text(json!({"type": "credentials", "credentials": {"k": 1}})),
            Some(TransportEvent::CredentialsUpdated(json!({"k": 1})))
        );
        assert_eq!(text(json!({"type": "open"})), Some(TransportEvent::Open));
        assert_eq!(
            text(json!({"type": "close", "reason": "logged_out"})),
            Some(TransportEvent::Closed(DisconnectReason::LoggedOut))
        );
        assert_eq!(
            text(json!({"type": "close", "reason": "timeout", "detail": "stream errored"})),
            Some(TransportEvent::Closed(DisconnectReason::ConnectionLost(
                "stream errored".into()
            )))
        );
    }

    #[test]
    fn unknown_frames_and_pings_are_skipped() {
        assert_eq!(text(json!({"type": "presence"})), None);
        assert_eq!(to_event(Ok(Message::Ping(Vec::new().into()))), None);
    }

    #[test]
    fn client_frames_are_tagged() {
        let credentials = json!({"token": "t"});
        let resume = serde_json::to_value(ClientFrame::Resume {
            credentials: &credentials,
        })
        .expect("serializable");
        assert_eq!(resume, json!({"type": "resume", "credentials": {"token": "t"}}));

        let send = serde_json::to_value(ClientFrame::Send {
            to: "31612345678",
            text: "hi",
        })
        .expect("serializable");
        assert_eq!(send, json!({"type": "send", "to": "31612345678", "text": "hi"}));
        assert_eq!(
            serde_json::to_value(ClientFrame::Pair).expect("serializable"),
            json!({"type": "pair"})
        );
    }
}
