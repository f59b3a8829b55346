use crate::api::AppState;
use crate::render::RenderEvent;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// GET /api/ws - Stream render events to a visualization client
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("WebSocket upgrade request received");
    let events = state.events.subscribe();
    ws.on_upgrade(|socket| handle_socket(socket, events))
}

/// Forward render events until the client leaves or the stream closes.
async fn handle_socket(mut socket: WebSocket, mut events: broadcast::Receiver<RenderEvent>) {
    info!("WebSocket connection established");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    None | Some(Ok(Message::Close(_))) => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = socket.send(Message::Pong(data)).await {
                            error!(error = %e, "Failed to send pong");
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        // Stream is one-way; client text is ignored
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            result = events.recv() => {
                match result {
                    Ok(event) => {
                        if let Err(e) = send_event(&mut socket, &event).await {
                            error!(error = %e, "Failed to send render event");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "WebSocket lagged, skipped render events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Render event stream closed");
                        break;
                    }
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

async fn send_event(socket: &mut WebSocket, event: &RenderEvent) -> anyhow::Result<()> {
    let json = serde_json::to_string(event)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
