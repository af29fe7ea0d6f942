//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer. The password hash is never serialized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use devconnect_shared::protocol::PeerSummary;
use devconnect_shared::types::{ConversationId, RequestStatus, UserId};

use crate::database::now;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered identity together with its embedded relationship lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Stored trimmed and lowercased; unique across users.
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub bio: String,
    pub skills: Vec<String>,
    pub profile_picture: String,
    pub github: String,
    pub linkedin: String,
    /// Ordered list of connected user ids. Symmetric once converged.
    pub connections: Vec<UserId>,
    /// Requests received by this user, oldest first.
    pub connection_requests: Vec<ConnectionRequest>,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_connected_to(&self, other: &UserId) -> bool {
        self.connections.contains(other)
    }

    /// The pending request this user received from `from`, if any.
    pub fn pending_request_from(&self, from: &UserId) -> Option<&ConnectionRequest> {
        self.connection_requests
            .iter()
            .find(|r| r.from == *from && r.status.is_pending())
    }

    pub fn pending_request_from_mut(&mut self, from: &UserId) -> Option<&mut ConnectionRequest> {
        self.connection_requests
            .iter_mut()
            .find(|r| r.from == *from && r.status.is_pending())
    }

    /// Append `other` to the connection list unless it is already there.
    /// Returns whether the list changed.
    pub fn add_connection(&mut self, other: UserId) -> bool {
        if self.is_connected_to(&other) {
            return false;
        }
        self.connections.push(other);
        true
    }

    /// Returns whether the list changed.
    pub fn remove_connection(&mut self, other: &UserId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|id| id != other);
        before != self.connections.len()
    }

    pub fn request_count(&self, status: RequestStatus) -> usize {
        self.connection_requests
            .iter()
            .filter(|r| r.status == status)
            .count()
    }

    pub fn summary(&self) -> PeerSummary {
        PeerSummary {
            id: self.id,
            name: self.name.clone(),
            profile_picture: self.profile_picture.clone(),
        }
    }
}

/// Input for creating a user at registration.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub bio: String,
    pub skills: Vec<String>,
    pub profile_picture: String,
    pub github: String,
    pub linkedin: String,
}

// ---------------------------------------------------------------------------
// ConnectionRequest
// ---------------------------------------------------------------------------

/// A connection request, embedded in the receiving user's record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub from: UserId,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

impl ConnectionRequest {
    pub fn pending(from: UserId) -> Self {
        Self {
            from,
            status: RequestStatus::Pending,
            created_at: now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A direct message between two users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender: UserId,
    pub receiver: UserId,
    pub content: String,
    pub is_read: bool,
    pub conversation_id: ConversationId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Build a new unread message. The conversation id is derived from the
    /// two participants.
    pub fn new(sender: UserId, receiver: UserId, content: impl Into<String>) -> Self {
        let now = now();
        Self {
            id: Uuid::new_v4(),
            sender,
            receiver,
            content: content.into(),
            is_read: false,
            conversation_id: ConversationId::between(&sender, &receiver),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn involves(&self, user: &UserId) -> bool {
        self.sender == *user || self.receiver == *user
    }

    /// The participant that is not `user`.
    pub fn other_participant(&self, user: &UserId) -> UserId {
        if self.sender == *user {
            self.receiver
        } else {
            self.sender
        }
    }
}
