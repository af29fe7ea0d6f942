//! Live connection tracking.
//!
//! Maintains an in-memory map of online users and the event senders of each
//! of their open connections. Nothing here is persisted: after a restart the
//! map is rebuilt as clients reconnect.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use devconnect_shared::constants::DEFAULT_EVENT_BUFFER;
use devconnect_shared::protocol::ServerEvent;
use devconnect_shared::types::UserId;

use crate::notifier::Notifier;

/// Identifies one open connection of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle {
    pub connection_id: Uuid,
    pub user_id: UserId,
}

/// Tracks every open real-time connection, keyed by user.
#[derive(Clone)]
pub struct PresenceRegistry {
    users: Arc<RwLock<HashMap<UserId, HashMap<Uuid, mpsc::Sender<ServerEvent>>>>>,
    buffer: usize,
}

impl PresenceRegistry {
    /// Create an empty registry whose connections buffer up to `buffer`
    /// undelivered events each.
    pub fn new(buffer: usize) -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            buffer: buffer.max(1),
        }
    }

    /// Register a new connection for `user_id`. Events for the user are
    /// delivered on the returned receiver until [`PresenceRegistry::unregister`]
    /// is called with the handle.
    pub async fn register(&self, user_id: UserId) -> (ConnectionHandle, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let handle = ConnectionHandle {
            connection_id: Uuid::new_v4(),
            user_id,
        };

        let mut users = self.users.write().await;
        let connections = users.entry(user_id).or_default();
        connections.insert(handle.connection_id, tx);

        debug!(
            user = %user_id,
            connection = %handle.connection_id,
            connections = connections.len(),
            "Registered live connection"
        );

        (handle, rx)
    }

    /// Remove a connection. Returns `true` when it was the user's last one,
    /// i.e. the user just went offline.
    pub async fn unregister(&self, handle: &ConnectionHandle) -> bool {
        let mut users = self.users.write().await;
        let Some(connections) = users.get_mut(&handle.user_id) else {
            return false;
        };

        if connections.remove(&handle.connection_id).is_none() {
            return false;
        }
        debug!(
            user = %handle.user_id,
            connection = %handle.connection_id,
            "Removed live connection"
        );

        if connections.is_empty() {
            users.remove(&handle.user_id);
            true
        } else {
            false
        }
    }

    pub async fn is_online(&self, user_id: &UserId) -> bool {
        self.users.read().await.contains_key(user_id)
    }

    /// Number of open connections across all users.
    pub async fn connection_count(&self) -> usize {
        self.users.read().await.values().map(HashMap::len).sum()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

#[async_trait]
impl Notifier for PresenceRegistry {
    async fn emit_to_user(&self, user: &UserId, event: ServerEvent) {
        let users = self.users.read().await;
        let Some(connections) = users.get(user) else {
            return;
        };

        for (connection_id, tx) in connections {
            if tx.try_send(event.clone()).is_err() {
                debug!(
                    user = %user,
                    connection = %connection_id,
                    event = event.name(),
                    "Dropping event for slow or closed connection"
                );
            }
        }
    }
}
