use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use devconnect_shared::types::{ConversationId, UserId};

use crate::database::{decode_ts, decode_user_id, encode_ts, now, Database};
use crate::error::{Result, StoreError};
use crate::models::Message;

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, receiver_id, content, is_read, created_at, updated_at";

impl Database {
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (id, conversation_id, sender_id, receiver_id, content, is_read,
                                   created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.id.to_string(),
                message.conversation_id.as_str(),
                message.sender.to_string(),
                message.receiver.to_string(),
                message.content,
                message.is_read,
                encode_ts(&message.created_at),
                encode_ts(&message.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_message_by_id(&self, id: Uuid) -> Result<Message> {
        self.conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .optional()?
            .ok_or(StoreError::NotFound)
    }

    /// All messages of a conversation in creation order. Messages created at
    /// the same instant keep insertion order.
    pub fn find_messages_by_conversation(&self, conversation: &ConversationId) -> Result<Vec<Message>> {
        self.collect_messages(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at ASC, seq ASC"
            ),
            conversation.as_str(),
        )
    }

    /// Every message the user sent or received, in creation order.
    pub fn find_messages_for_user(&self, user: &UserId) -> Result<Vec<Message>> {
        self.collect_messages(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE sender_id = ?1 OR receiver_id = ?1
                 ORDER BY created_at ASC, seq ASC"
            ),
            &user.to_string(),
        )
    }

    /// Mark every unread message of the conversation addressed to `receiver`
    /// as read. Returns the number of messages changed.
    pub fn mark_conversation_read(
        &self,
        conversation: &ConversationId,
        receiver: &UserId,
    ) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE messages SET is_read = 1, updated_at = ?3
             WHERE conversation_id = ?1 AND receiver_id = ?2 AND is_read = 0",
            params![
                conversation.as_str(),
                receiver.to_string(),
                encode_ts(&now())
            ],
        )?;
        Ok(affected)
    }

    /// Mark the given messages as read, restricted to unread ones addressed
    /// to `receiver`. Returns the messages that changed, as now stored.
    pub fn mark_messages_read(&self, ids: &[Uuid], receiver: &UserId) -> Result<Vec<Message>> {
        let tx = self.conn().unchecked_transaction()?;
        let stamp = encode_ts(&now());
        let receiver = receiver.to_string();

        let mut marked = Vec::new();
        for id in ids {
            let id = id.to_string();
            let changed = tx.execute(
                "UPDATE messages SET is_read = 1, updated_at = ?3
                 WHERE id = ?1 AND receiver_id = ?2 AND is_read = 0",
                params![id, receiver, stamp],
            )?;
            if changed > 0 {
                marked.push(tx.query_row(
                    &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                    params![id],
                    row_to_message,
                )?);
            }
        }

        tx.commit()?;
        Ok(marked)
    }

    fn collect_messages(&self, sql: &str, param: &str) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params![param], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let conversation_str: String = row.get(1)?;
    let sender_str: String = row.get(2)?;
    let receiver_str: String = row.get(3)?;
    let created_str: String = row.get(6)?;
    let updated_str: String = row.get(7)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let conversation_id = ConversationId::parse(&conversation_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Message {
        id,
        sender: decode_user_id(2, &sender_str)?,
        receiver: decode_user_id(3, &receiver_str)?,
        content: row.get(4)?,
        is_read: row.get(5)?,
        conversation_id,
        created_at: decode_ts(6, &created_str)?,
        updated_at: decode_ts(7, &updated_str)?,
    })
}
