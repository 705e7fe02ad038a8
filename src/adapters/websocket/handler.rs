//! WebSocket upgrade endpoint and per-connection session loop.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::application::GameManager;
use crate::domain::foundation::{GameError, RoomId, UserId};
use crate::ports::OtpService;

use super::messages::ClientCommand;
use super::registry::{ConnectionRegistry, EventSink};

/// Shared state for the WebSocket routes.
#[derive(Clone)]
pub struct WsState {
    pub registry: Arc<ConnectionRegistry>,
    pub manager: Arc<GameManager>,
    pub otp: Arc<dyn OtpService>,
}

/// Routes for joining a room over WebSocket.
pub fn router(state: WsState) -> Router {
    Router::new()
        .route("/rooms/:room_id/ws", get(ws_upgrade))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct UpgradeQuery {
    /// One-time token minted by the authenticated HTTP API.
    p: String,
}

async fn ws_upgrade(
    State(state): State<WsState>,
    Path(room_id): Path<String>,
    Query(query): Query<UpgradeQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let (user_id, display_name) = match state.otp.verify(&query.p).await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::debug!(error = %err, "rejected upgrade");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    let room_id = RoomId::new(room_id);
    ws.on_upgrade(move |socket| run_session(state, socket, room_id, user_id, display_name))
}

/// The write half of a live connection, registered as the user's sink.
struct SocketSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl EventSink for SocketSink {
    async fn send(&mut self, frame: String) -> Result<(), GameError> {
        self.0
            .send(Message::Text(frame))
            .await
            .map_err(|err| GameError::Broker(err.to_string()))
    }
}

#[tracing::instrument(skip(state, socket, display_name), fields(room_id = %room_id, user_id = %user_id))]
async fn run_session(
    state: WsState,
    socket: WebSocket,
    room_id: RoomId,
    user_id: UserId,
    display_name: String,
) {
    let (write, mut read) = socket.split();
    state
        .registry
        .register(user_id.clone(), SocketSink(write))
        .await;

    if let Err(err) = state.manager.join(&room_id, &user_id, &display_name).await {
        tracing::warn!(error = %err, "join failed, closing session");
        state.registry.unregister(&user_id).await;
        return;
    }
    tracing::info!("session opened");

    while let Some(frame) = read.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            // Pings are answered by axum; other frame kinds carry nothing.
            Ok(_) => continue,
            Err(err) => {
                tracing::debug!(error = %err, "read failed, closing session");
                break;
            }
        };

        let command = match ClientCommand::decode(&text) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(error = %err, "undecodable frame, closing session");
                break;
            }
        };

        // Rule violations are per-command; the session survives them.
        if let Err(err) = dispatch(&state, &room_id, &user_id, command).await {
            tracing::warn!(error = %err, "command failed");
        }
    }

    state.registry.unregister(&user_id).await;
    tracing::info!("session closed");
}

async fn dispatch(
    state: &WsState,
    room_id: &RoomId,
    user_id: &UserId,
    command: ClientCommand,
) -> Result<(), GameError> {
    match command {
        ClientCommand::TypingKey { input_seq } => {
            state.manager.type_key(room_id, user_id, &input_seq).await
        }
        ClientCommand::FinCurrentSeq { cause } => {
            state.manager.fin_current_seq(room_id, user_id, cause).await
        }
        ClientCommand::StartGame => state.manager.start_game(room_id, user_id).await,
    }
}
