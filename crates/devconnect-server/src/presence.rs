//! Online/offline tracking and the events that follow from it.

use tokio::sync::mpsc;
use tracing::{debug, info};

use devconnect_realtime::ConnectionHandle;
use devconnect_shared::protocol::{MessageRead, ReadReceipt, ServerEvent, UserStatus};
use devconnect_shared::types::UserId;
use devconnect_store::database::now;

use crate::api::AppState;
use crate::error::ServerError;

/// Register a live connection for a known user, mark them online and tell
/// their online connections.
///
/// The registry update and the store write happen under the database lock,
/// so they cannot interleave with a concurrent [`on_disconnect`].
pub async fn on_connect(
    state: &AppState,
    user_id: UserId,
) -> Result<(ConnectionHandle, mpsc::Receiver<ServerEvent>), ServerError> {
    let (handle, rx, connections) = {
        let db = state.db.lock().await;
        let user = db.get_user(&user_id)?;

        let (handle, rx) = state.presence.register(user_id).await;
        let marked_online = db.set_presence(&user_id, true, now());
        if let Err(e) = marked_online {
            state.presence.unregister(&handle).await;
            return Err(e.into());
        }
        (handle, rx, user.connections)
    };
    info!(user = %user_id, connection = %handle.connection_id, "User connected");

    broadcast_status(
        state,
        &connections,
        UserStatus {
            user_id,
            is_online: true,
            last_seen: None,
        },
    )
    .await;
    Ok((handle, rx))
}

/// Drop a live connection. The user only goes offline when it was their
/// last one.
pub async fn on_disconnect(state: &AppState, handle: ConnectionHandle) -> Result<(), ServerError> {
    let user_id = handle.user_id;
    let last_seen = now();

    let connections = {
        let db = state.db.lock().await;
        if !state.presence.unregister(&handle).await {
            debug!(user = %user_id, "Connection closed, user still online elsewhere");
            return Ok(());
        }

        db.set_presence(&user_id, false, last_seen)?;
        match db.find_user(&user_id)? {
            Some(user) => user.connections,
            None => Vec::new(),
        }
    };
    info!(user = %user_id, "User went offline");

    broadcast_status(
        state,
        &connections,
        UserStatus {
            user_id,
            is_online: false,
            last_seen: Some(last_seen),
        },
    )
    .await;
    Ok(())
}

/// Handle an inbound `message:read`: mark the messages addressed to the
/// reader as read and send each of their senders a receipt for their own
/// messages.
pub async fn on_message_read(
    state: &AppState,
    reader: UserId,
    read: MessageRead,
) -> Result<(), ServerError> {
    if read.message_ids.is_empty() {
        return Ok(());
    }

    let marked = {
        let db = state.db.lock().await;
        db.mark_messages_read(&read.message_ids, &reader)?
    };
    debug!(
        reader = %reader,
        requested = read.message_ids.len(),
        marked = marked.len(),
        "Read receipt"
    );

    let mut receipts: Vec<(UserId, Vec<_>)> = Vec::new();
    for message in marked {
        match receipts.iter_mut().find(|(sender, _)| *sender == message.sender) {
            Some((_, ids)) => ids.push(message.id),
            None => receipts.push((message.sender, vec![message.id])),
        }
    }

    for (sender, message_ids) in receipts {
        state
            .notifier
            .emit_to_user(
                &sender,
                ServerEvent::MessageReadUpdate(ReadReceipt {
                    message_ids,
                    read_by: reader,
                }),
            )
            .await;
    }
    Ok(())
}

async fn broadcast_status(state: &AppState, connections: &[UserId], status: UserStatus) {
    for peer in connections {
        if state.presence.is_online(peer).await {
            state
                .notifier
                .emit_to_user(peer, ServerEvent::UserStatus(status.clone()))
                .await;
        }
    }
}
