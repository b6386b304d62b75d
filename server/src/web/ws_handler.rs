use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::engine::commands::{Command, StatePatch};
use crate::engine::session::ClientSession;
use crate::engine::state::ClientState;

use super::app_state::AppState;
use super::auth_middleware::MaybeAuthUser;

/// Messages pushed from server to client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full state. Sent on connect and whenever the client fell behind.
    Snapshot { state: ClientState },
    Patch { patch: StatePatch },
}

/// GET /ws — upgrade to a WebSocket carrying commands in and state patches out.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(identity): MaybeAuthUser,
) -> impl IntoResponse {
    let session = Arc::new(ClientSession::new(state.engine.clone(), identity));
    ws.on_upgrade(move |socket| handle_socket(socket, session))
}

/// Drive one connection until either side goes away.
///
/// When the connection ends both halves are aborted. A command already being
/// dispatched runs on its own task and still completes, so its database
/// writes are never cut off halfway.
async fn handle_socket(socket: WebSocket, session: Arc<ClientSession>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (initial, mut patches) = session.store().subscribe_with_snapshot();
    let user_id = session.user().map(|u| u.user_id);
    info!(user_id = ?user_id, "WebSocket connected");

    let send_session = session.clone();
    let mut send_task = tokio::spawn(async move {
        let mut next = Some(ServerMessage::Snapshot { state: initial });
        loop {
            let msg = match next.take() {
                Some(msg) => msg,
                None => match patches.recv().await {
                    Ok(patch) => ServerMessage::Patch { patch },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "client fell behind, resending snapshot");
                        ServerMessage::Snapshot {
                            state: send_session.store().snapshot(),
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
            };
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "Failed to serialize server message");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_session = session.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<Command>(&text) {
                    Ok(command) => {
                        debug!(?command, "dispatching command");
                        let session = recv_session.clone();
                        let dispatch =
                            tokio::spawn(async move { session.dispatch(command).await });
                        if let Err(e) = dispatch.await {
                            error!(error = %e, "command task failed");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to parse client command");
                        recv_session.store().commit(&[StatePatch::Error {
                            message: format!("Invalid command: {e}"),
                        }]);
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!(user_id = ?user_id, "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{CommunityRow, PrivacyType};

    #[test]
    fn test_server_message_shape() {
        let msg = ServerMessage::Patch {
            patch: StatePatch::CurrentCommunitySet {
                community: CommunityRow {
                    id: "test1".into(),
                    creator_id: "u1".into(),
                    number_of_members: 1,
                    privacy_type: PrivacyType::Public,
                    image_url: None,
                    created_at: "2024-01-01 00:00:00".into(),
                },
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "patch");
        assert_eq!(json["patch"]["type"], "current_community_set");
        assert_eq!(json["patch"]["community"]["privacy_type"], "public");
    }

    #[test]
    fn test_snapshot_shape() {
        let json = serde_json::to_value(ServerMessage::Snapshot {
            state: ClientState::default(),
        })
        .unwrap();
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["state"]["loading"], false);
        assert!(json["state"]["user"].is_null());
    }
}
