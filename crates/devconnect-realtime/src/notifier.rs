use async_trait::async_trait;

use devconnect_shared::protocol::ServerEvent;
use devconnect_shared::types::UserId;

/// Best-effort delivery of real-time events to users.
///
/// Delivery never fails from the caller's point of view: a user without a
/// live connection simply does not receive the event, and nothing is queued
/// for later.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `event` to every live connection of `user`.
    async fn emit_to_user(&self, user: &UserId, event: ServerEvent);

    /// Deliver `event` to each of `users`.
    async fn emit_to_users(&self, users: &[UserId], event: ServerEvent) {
        for user in users {
            self.emit_to_user(user, event.clone()).await;
        }
    }
}
