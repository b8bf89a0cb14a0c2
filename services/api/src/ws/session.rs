//! Manages the ConversationRelay WebSocket connection lifecycle.

use super::{protocol::OutboundEvent, relay::RelaySession};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Runs one relay connection to completion.
///
/// The registry entry created on `setup` is always released when the loop
/// ends, whatever the cause.
#[instrument(name = "relay_session", skip_all, fields(connection_id, call_sid))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id: u32 = rand::random();
    tracing::Span::current().record("connection_id", connection_id);
    info!("New relay connection.");

    let mut relay = RelaySession::new(
        state.registry.clone(),
        state.conversation_client.clone(),
        Arc::from(state.config.fallback_reply.as_str()),
    );

    if let Err(e) = run_relay(socket, &mut relay).await {
        error!(error = ?e, "Relay connection terminated with error.");
    }

    info!(call_sid = ?relay.call_sid(), "WebSocket connection closed for call");
    relay.close().await;
}

/// Reads frames until the peer disconnects, answering each prompt in order.
async fn run_relay(mut socket: WebSocket, relay: &mut RelaySession) -> Result<()> {
    while let Some(msg_result) = socket.next().await {
        match msg_result? {
            Message::Text(text) => {
                if let Some(reply) = relay.handle_text(text.as_str()).await {
                    send_msg(&mut socket, &reply).await?;
                }
            }
            Message::Close(_) => {
                info!("Provider sent close frame.");
                break;
            }
            Message::Binary(_) => {
                warn!("Ignoring binary frame on relay connection.");
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
    Ok(())
}

/// Serializes and sends an `OutboundEvent` to the provider.
pub(crate) async fn send_msg(socket: &mut WebSocket, msg: &OutboundEvent) -> Result<()> {
    let serialized = serde_json::to_string(msg)?;
    socket.send(Message::Text(serialized.into())).await?;
    Ok(())
}
