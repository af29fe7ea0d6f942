//! Direct messaging.
//!
//! Conversations are never stored: they are derived from the flat message
//! log by grouping on the conversation id both participants compute.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use devconnect_shared::protocol::{ChatMessage, PeerSummary, ServerEvent};
use devconnect_shared::types::{ConversationId, UserId};
use devconnect_store::{Database, Message, User};

use crate::api::AppState;
use crate::error::ServerError;
use crate::profiles::ConnectionProfile;

/// The other participant of a conversation as shown in the inbox.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPeer {
    pub id: UserId,
    pub name: String,
    pub profile_picture: String,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

impl From<&User> for ConversationPeer {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            profile_picture: user.profile_picture.clone(),
            is_online: user.is_online,
            last_seen: user.last_seen,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub last_message: Message,
    pub unread_count: usize,
    pub other_user: Option<ConversationPeer>,
}

/// One entry per conversation the user takes part in, most recently active
/// first.
pub async fn list_conversations(
    state: &AppState,
    user_id: UserId,
) -> Result<Vec<ConversationSummary>, ServerError> {
    let db = state.db.lock().await;
    let messages = db.find_messages_for_user(&user_id)?;

    let mut order: Vec<ConversationId> = Vec::new();
    let mut groups: HashMap<ConversationId, (Message, usize)> = HashMap::new();

    // Messages arrive in creation order, so the last one seen per group is
    // the latest, with later inserts winning equal timestamps.
    for message in messages {
        let unread = usize::from(message.receiver == user_id && !message.is_read);
        match groups.get_mut(&message.conversation_id) {
            Some((latest, count)) => {
                *count += unread;
                *latest = message;
            }
            None => {
                order.push(message.conversation_id.clone());
                groups.insert(message.conversation_id.clone(), (message, unread));
            }
        }
    }

    let mut summaries = Vec::with_capacity(order.len());
    for id in order {
        let Some((last_message, unread_count)) = groups.remove(&id) else {
            continue;
        };
        let other = last_message.other_participant(&user_id);
        let other_user = db.find_user(&other)?.as_ref().map(ConversationPeer::from);
        summaries.push(ConversationSummary {
            id,
            last_message,
            unread_count,
            other_user,
        });
    }
    summaries.sort_by(|a, b| b.last_message.created_at.cmp(&a.last_message.created_at));

    Ok(summaries)
}

/// All messages of a conversation, oldest first. Messages addressed to the
/// requester are marked read, and the returned list reflects that.
pub async fn list_messages(
    state: &AppState,
    conversation: &ConversationId,
    requester: UserId,
) -> Result<Vec<ChatMessage>, ServerError> {
    let db = state.db.lock().await;

    let mut messages = db.find_messages_by_conversation(conversation)?;
    if messages.is_empty() {
        return Err(ServerError::NotFound("Conversation not found".into()));
    }
    if !messages.iter().any(|m| m.involves(&requester)) {
        return Err(ServerError::Forbidden("Access denied".into()));
    }

    let marked = db.mark_conversation_read(conversation, &requester)?;
    if marked > 0 {
        debug!(conversation = %conversation, reader = %requester, marked, "Marked messages read");
        messages = db.find_messages_by_conversation(conversation)?;
    }

    let mut peers = PeerCache::default();
    let mut thread = Vec::with_capacity(messages.len());
    for message in messages {
        let sender = peers.get(&db, message.sender)?;
        let receiver = peers.get(&db, message.receiver)?;
        thread.push(chat_message(message, sender, receiver));
    }
    Ok(thread)
}

/// Store a message from `sender` to `receiver` and push it to both.
pub async fn send_message(
    state: &AppState,
    sender: UserId,
    receiver: UserId,
    content: &str,
) -> Result<ChatMessage, ServerError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ServerError::Validation(
            "Receiver ID and content are required".into(),
        ));
    }

    let chat = {
        let db = state.db.lock().await;
        let sender_user = db.get_user(&sender)?;
        let receiver_user = db.find_user(&receiver)?;

        // Either side listing the other counts, so a half-written
        // relationship still allows messaging.
        let connected = sender_user.is_connected_to(&receiver)
            || receiver_user
                .as_ref()
                .is_some_and(|r| r.is_connected_to(&sender));
        if !connected {
            return Err(ServerError::Forbidden(
                "You can only message your connections".into(),
            ));
        }
        let receiver_user =
            receiver_user.ok_or_else(|| ServerError::NotFound("Receiver not found".into()))?;

        let message = Message::new(sender, receiver, content);
        db.insert_message(&message)?;
        chat_message(message, sender_user.summary(), receiver_user.summary())
    };

    info!(
        message = %chat.id,
        conversation = %chat.conversation_id,
        from = %sender,
        "Message sent"
    );
    state
        .notifier
        .emit_to_users(&[sender, receiver], ServerEvent::MessageNew(chat.clone()))
        .await;
    Ok(chat)
}

/// Connections offered in the messaging sidebar: the user's own list, then
/// anyone whose list contains the user, without duplicates.
pub async fn messaging_connections(
    state: &AppState,
    user_id: UserId,
) -> Result<Vec<ConnectionProfile>, ServerError> {
    let db = state.db.lock().await;
    let user = db.get_user(&user_id)?;
    let own = db.find_users_by_ids(&user.connections)?;
    let reverse = db.find_users_listing(&user_id)?;

    let mut seen = HashSet::new();
    Ok(own
        .iter()
        .chain(reverse.iter())
        .filter(|u| seen.insert(u.id))
        .map(ConnectionProfile::from)
        .collect())
}

pub(crate) fn chat_message(message: Message, sender: PeerSummary, receiver: PeerSummary) -> ChatMessage {
    ChatMessage {
        id: message.id,
        sender,
        receiver,
        content: message.content,
        conversation_id: message.conversation_id,
        is_read: message.is_read,
        created_at: message.created_at,
        updated_at: message.updated_at,
    }
}

/// Resolves participant summaries once per request.
#[derive(Default)]
struct PeerCache {
    peers: HashMap<UserId, PeerSummary>,
}

impl PeerCache {
    fn get(&mut self, db: &Database, id: UserId) -> Result<PeerSummary, ServerError> {
        if let Some(peer) = self.peers.get(&id) {
            return Ok(peer.clone());
        }
        let peer = match db.find_user(&id)? {
            Some(user) => user.summary(),
            None => PeerSummary {
                id,
                name: String::new(),
                profile_picture: String::new(),
            },
        };
        self.peers.insert(id, peer.clone());
        Ok(peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::{accept_request, remove_connection, send_request};
    use crate::test_support::{add_user, connect, test_state};

    #[tokio::test]
    async fn test_message_requires_connection() {
        let (state, notifier) = test_state();
        let alice = add_user(&state, "Alice", &[]).await;
        let bob = add_user(&state, "Bob", &[]).await;

        assert!(matches!(
            send_message(&state, alice, bob, "hi").await,
            Err(ServerError::Forbidden(_))
        ));

        send_request(&state, alice, bob).await.unwrap();
        accept_request(&state, bob, alice).await.unwrap();
        notifier.clear();

        let chat = send_message(&state, alice, bob, "  hello  ").await.unwrap();
        assert_eq!(chat.content, "hello");
        assert_eq!(chat.sender.name, "Alice");
        assert_eq!(chat.receiver.id, bob);
        assert_eq!(chat.conversation_id, ConversationId::between(&bob, &alice));

        for user in [alice, bob] {
            let events = notifier.events_for(&user);
            assert_eq!(events, vec![ServerEvent::MessageNew(chat.clone())]);
        }
    }

    #[tokio::test]
    async fn test_send_message_validation_order() {
        let (state, _) = test_state();
        let alice = add_user(&state, "Alice", &[]).await;
        let bob = add_user(&state, "Bob", &[]).await;
        connect(&state, alice, bob).await;

        assert!(matches!(
            send_message(&state, alice, bob, "   ").await,
            Err(ServerError::Validation(_))
        ));
        assert!(matches!(
            send_message(&state, alice, UserId::new(), "hi").await,
            Err(ServerError::Forbidden(_))
        ));

        // A dangling id in the sender's own list: connected but gone.
        let ghost = UserId::new();
        {
            let db = state.db.lock().await;
            let mut a = db.get_user(&alice).unwrap();
            a.add_connection(ghost);
            db.save_user(&a).unwrap();
        }
        assert!(matches!(
            send_message(&state, alice, ghost, "hi").await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_half_written_relationship_allows_messaging() {
        let (state, _) = test_state();
        let alice = add_user(&state, "Alice", &[]).await;
        let bob = add_user(&state, "Bob", &[]).await;
        {
            let db = state.db.lock().await;
            let mut b = db.get_user(&bob).unwrap();
            b.add_connection(alice);
            db.save_user(&b).unwrap();
        }

        assert!(send_message(&state, alice, bob, "hi").await.is_ok());

        let sidebar = messaging_connections(&state, alice).await.unwrap();
        assert_eq!(sidebar.len(), 1);
        assert_eq!(sidebar[0].id, bob);
    }

    #[tokio::test]
    async fn test_list_messages_marks_read() {
        let (state, _) = test_state();
        let alice = add_user(&state, "Alice", &[]).await;
        let bob = add_user(&state, "Bob", &[]).await;
        let eve = add_user(&state, "Eve", &[]).await;
        connect(&state, alice, bob).await;

        send_message(&state, alice, bob, "one").await.unwrap();
        send_message(&state, alice, bob, "two").await.unwrap();
        send_message(&state, bob, alice, "three").await.unwrap();

        let inbox = list_conversations(&state, bob).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].unread_count, 2);
        assert_eq!(inbox[0].last_message.content, "three");
        assert_eq!(inbox[0].other_user.as_ref().unwrap().name, "Alice");

        let conversation = ConversationId::between(&alice, &bob);
        assert!(matches!(
            list_messages(&state, &conversation, eve).await,
            Err(ServerError::Forbidden(_))
        ));

        let thread = list_messages(&state, &conversation, bob).await.unwrap();
        let contents: Vec<&str> = thread.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert!(thread[0].is_read && thread[1].is_read);
        assert!(!thread[2].is_read);

        let inbox = list_conversations(&state, bob).await.unwrap();
        assert_eq!(inbox[0].unread_count, 0);
        let inbox = list_conversations(&state, alice).await.unwrap();
        assert_eq!(inbox[0].unread_count, 1);
    }

    #[tokio::test]
    async fn test_unknown_conversation_not_found() {
        let (state, _) = test_state();
        let alice = add_user(&state, "Alice", &[]).await;
        let conversation = ConversationId::between(&alice, &UserId::new());
        assert!(matches!(
            list_messages(&state, &conversation, alice).await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_inbox_sorted_by_latest_message() {
        let (state, _) = test_state();
        let me = add_user(&state, "Me", &[]).await;
        let first = add_user(&state, "First", &[]).await;
        let second = add_user(&state, "Second", &[]).await;
        connect(&state, me, first).await;
        connect(&state, me, second).await;

        send_message(&state, me, first, "old").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        send_message(&state, second, me, "new").await.unwrap();

        let inbox = list_conversations(&state, me).await.unwrap();
        let peers: Vec<UserId> = inbox
            .iter()
            .map(|c| c.other_user.as_ref().unwrap().id)
            .collect();
        assert_eq!(peers, vec![second, first]);

        // History survives removing the connection.
        remove_connection(&state, me, first).await.unwrap();
        assert_eq!(list_conversations(&state, me).await.unwrap().len(), 2);
    }
}
