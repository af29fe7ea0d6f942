//! WebSocket endpoint for real-time events.
//!
//! Each socket registers one live connection for its user. Outgoing events
//! are forwarded from the registry channel; incoming frames are parsed as
//! [`ClientEvent`]s.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use devconnect_shared::protocol::ClientEvent;
use devconnect_shared::types::UserId;

use crate::api::AppState;
use crate::error::ServerError;
use crate::presence;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsParams {
    pub user_id: Option<String>,
}

/// `GET /ws?userId=<id>`. Unknown or missing ids are refused before the
/// upgrade.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: Option<WebSocketUpgrade>,
) -> Result<Response, ServerError> {
    let raw = params.user_id.ok_or(ServerError::Unauthenticated)?;
    let user_id = UserId::parse(&raw).map_err(|_| ServerError::Unauthenticated)?;

    let known = state.db.lock().await.find_user(&user_id)?.is_some();
    if !known {
        debug!(user = %user_id, "Refused socket for unknown user");
        return Err(ServerError::Unauthenticated);
    }

    let ws = ws.ok_or_else(|| ServerError::Validation("Expected a WebSocket upgrade".into()))?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: UserId) {
    let (handle, mut events) = match presence::on_connect(&state, user_id).await {
        Ok(registered) => registered,
        Err(e) => {
            warn!(user = %user_id, error = %e, "Could not register socket");
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match event.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, event = event.name(), "Failed to encode event");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            match frame {
                WsMessage::Text(text) => match ClientEvent::from_json(&text) {
                    Ok(ClientEvent::MessageRead(read)) => {
                        if let Err(e) = presence::on_message_read(&recv_state, user_id, read).await {
                            warn!(user = %user_id, error = %e, "Failed to apply read receipt");
                        }
                    }
                    Err(e) => debug!(user = %user_id, error = %e, "Ignoring malformed frame"),
                },
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    // Whichever side finishes first tears down the other.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    if let Err(e) = presence::on_disconnect(&state, handle).await {
        warn!(user = %user_id, error = %e, "Failed to record disconnect");
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use devconnect_shared::types::UserId;

    use crate::api::build_router;
    use crate::test_support::{add_user, test_state};

    async fn socket_status(app: &axum::Router, uri: &str) -> StatusCode {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.clone().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_unknown_or_missing_user_refused() {
        let (state, _) = test_state();
        let app = build_router(state.clone());

        assert_eq!(socket_status(&app, "/ws").await, StatusCode::UNAUTHORIZED);
        assert_eq!(socket_status(&app, "/ws?userId=garbage").await, StatusCode::UNAUTHORIZED);
        let stranger = format!("/ws?userId={}", UserId::new());
        assert_eq!(socket_status(&app, &stranger).await, StatusCode::UNAUTHORIZED);
        assert_eq!(state.presence.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_known_user_needs_upgrade() {
        let (state, _) = test_state();
        let alice = add_user(&state, "Alice", &[]).await;
        let app = build_router(state.clone());

        let uri = format!("/ws?userId={alice}");
        assert_eq!(socket_status(&app, &uri).await, StatusCode::BAD_REQUEST);
        assert_eq!(state.presence.connection_count().await, 0);
    }
}
