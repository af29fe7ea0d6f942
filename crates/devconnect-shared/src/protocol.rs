//! Real-time wire protocol.
//!
//! Every frame on the WebSocket channel is a JSON text frame of the form
//! `{"event": "<name>", "data": { ... }}`. Event names match what the web
//! client listens for, so they are spelled out with `serde(rename)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::types::{ConversationId, UserId};

/// Events pushed from the server to a connected client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// A connection request was sent to, or accepted by, another user
    #[serde(rename = "connectionRequest")]
    ConnectionRequest(ConnectionRequestNotice),

    /// A connection went online or offline
    #[serde(rename = "user:status")]
    UserStatus(UserStatus),

    /// A direct message was created
    #[serde(rename = "message:new")]
    MessageNew(ChatMessage),

    /// Messages sent by the recipient of this event were read
    #[serde(rename = "message:read:update")]
    MessageReadUpdate(ReadReceipt),
}

/// Events sent from a connected client to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "message:read")]
    MessageRead(MessageRead),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeType {
    NewRequest,
    RequestAccepted,
}

/// Minimal public view of a user, embedded in events and message payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSummary {
    pub id: UserId,
    pub name: String,
    pub profile_picture: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequestNotice {
    #[serde(rename = "type")]
    pub kind: NoticeType,
    pub from: PeerSummary,
    pub message: String,
}

impl ConnectionRequestNotice {
    pub fn new_request(from: PeerSummary) -> Self {
        let message = format!("{} sent you a connection request", from.name);
        Self {
            kind: NoticeType::NewRequest,
            from,
            message,
        }
    }

    pub fn request_accepted(from: PeerSummary) -> Self {
        let message = format!("{} accepted your connection request", from.name);
        Self {
            kind: NoticeType::RequestAccepted,
            from,
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    pub user_id: UserId,
    pub is_online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// A direct message as delivered to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: PeerSummary,
    pub receiver: PeerSummary,
    pub content: String,
    pub conversation_id: ConversationId,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub message_ids: Vec<Uuid>,
    pub read_by: UserId,
}

/// Inbound read notice. `sender_id` is the client's view only; receipts go
/// to the sender recorded on each message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRead {
    pub message_ids: Vec<Uuid>,
    pub sender_id: UserId,
}

impl ServerEvent {
    /// The event name as seen by clients
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionRequest(_) => "connectionRequest",
            Self::UserStatus(_) => "user:status",
            Self::MessageNew(_) => "message:new",
            Self::MessageReadUpdate(_) => "message:read:update",
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl ClientEvent {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}
