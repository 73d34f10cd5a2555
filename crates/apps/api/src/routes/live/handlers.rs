use crate::api_state::ApiContext;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use common_services::notify::LiveEvent;
use std::sync::Arc;
use tokio::{select, sync::broadcast};
use tracing::{debug, error, info, warn};

/// Live UI channel. Every committed change is pushed as one JSON text frame.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Live",
    responses(
        (status = 101, description = "Switching to websocket; frames carry `LiveEvent` JSON.", body = LiveEvent),
    )
)]
pub async fn live_websocket_handler(
    ws: WebSocketUpgrade,
    State(context): State<ApiContext>,
) -> axum::response::Response {
    let events = context.pipeline.fanout.subscribe();
    ws.on_upgrade(move |socket| handle_live_socket(socket, events))
}

pub async fn handle_live_socket(
    mut socket: WebSocket,
    mut events: broadcast::Receiver<Arc<LiveEvent>>,
) {
    info!("Live viewer connected");

    loop {
        select! {
            result = events.recv() => {
                match result {
                    Ok(event) => {
                        let json = match serde_json::to_string(&*event) {
                            Ok(json) => json,
                            Err(e) => {
                                error!("Cannot serialize live event: {e}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Live viewer fell behind, {skipped} events skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    debug!("Live viewer disconnected");
}
