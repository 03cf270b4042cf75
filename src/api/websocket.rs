//! WebSocket handler for real-time presence connections

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use tracing::{debug, info, warn};

use super::AppState;
use crate::presence::ConnectionSession;

/// Handle WebSocket upgrade
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one connection: inbound frames are handled in arrival order,
/// outbound events are written in the order they were queued.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (mut session, mut rx) = ConnectionSession::open(state.presence.clone());
    let session_id = session.id();

    info!("WebSocket connected: {}", session_id);

    loop {
        tokio::select! {
            Some(msg) = rx.recv() => {
                let json = match msg.encode() {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to encode {} for {}: {}", msg.kind(), session_id, e);
                        continue;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        session.handle_frame(text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        session.reject_frame("binary frames are not supported");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!("WebSocket error on {}: {}", session_id, e);
                        break;
                    }
                    // ping/pong are answered by the transport
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // leaves the room, if any, before the socket goes away
    session.close();
    info!("WebSocket disconnected: {}", session_id);
}
