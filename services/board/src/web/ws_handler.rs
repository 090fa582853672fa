//! services/board/src/web/ws_handler.rs
//!
//! Pushes refreshed views to the front-end. On connect the socket receives the
//! current board (and thread, if one is open); afterwards every view change in
//! the board client is forwarded as it happens.

use crate::client::ViewEvent;
use crate::web::protocol::{BoardViewDto, ServerMessage, ThreadViewDto};
use crate::web::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established.");
    let (mut sender, mut receiver) = socket.split();
    let mut events = app_state.client.subscribe_views();

    // --- 1. Initial snapshot ---
    for message in snapshot(&app_state).await {
        if send(&mut sender, &message).await.is_err() {
            error!("Failed to send initial view.");
            return;
        }
    }

    // --- 2. Forward view changes until either side goes away ---
    'socket: loop {
        let outgoing = tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client disconnected.");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(ViewEvent::BoardChanged) => vec![board_message(&app_state).await],
                Ok(ViewEvent::ThreadChanged(_)) => {
                    thread_message(&app_state).await.into_iter().collect()
                }
                Ok(ViewEvent::ThreadClosed) => vec![ServerMessage::ThreadClosed],
                Ok(ViewEvent::Notice(message)) => vec![ServerMessage::Notice { message }],
                // Missed some events; the current views cover them.
                Err(RecvError::Lagged(skipped)) => {
                    warn!("WebSocket fell behind by {} view events.", skipped);
                    snapshot(&app_state).await
                }
                Err(RecvError::Closed) => break,
            },
        };

        for message in outgoing {
            if send(&mut sender, &message).await.is_err() {
                error!("Failed to push view update. Closing connection.");
                break 'socket;
            }
        }
    }

    info!("WebSocket connection closed.");
}

/// The board, plus the reply thread when one is open.
async fn snapshot(app_state: &AppState) -> Vec<ServerMessage> {
    let mut messages = vec![board_message(app_state).await];
    messages.extend(thread_message(app_state).await);
    messages
}

async fn board_message(app_state: &AppState) -> ServerMessage {
    let view = app_state.client.board_view().await;
    ServerMessage::Board {
        view: BoardViewDto::from_view(view, app_state.client.session()),
    }
}

async fn thread_message(app_state: &AppState) -> Option<ServerMessage> {
    let view = app_state.client.thread_view().await?;
    Some(ServerMessage::Thread {
        view: ThreadViewDto::from_view(view, app_state.client.session()),
    })
}

async fn send<S>(sender: &mut S, message: &ServerMessage) -> Result<(), ()>
where
    S: futures::Sink<Message> + Unpin,
{
    let json = serde_json::to_string(message).map_err(|e| {
        error!("Failed to serialize server message: {}", e);
    })?;
    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}
