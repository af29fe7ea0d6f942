//! Index-backed lookups over connection requests.
//!
//! Requests are written through [`Database::save_user`] as part of the
//! receiving user's record; these helpers answer pair queries without
//! loading and scanning whole users.

use rusqlite::{params, OptionalExtension};

use devconnect_shared::types::{RequestStatus, UserId};

use crate::database::{decode_user_id, Database};
use crate::error::Result;
use crate::models::ConnectionRequest;
use crate::users::row_to_request;

impl Database {
    /// The pending request `from -> to`, if one exists.
    pub fn find_pending_request(
        &self,
        from: &UserId,
        to: &UserId,
    ) -> Result<Option<ConnectionRequest>> {
        let request = self
            .conn()
            .query_row(
                "SELECT sender_id, status, created_at FROM connection_requests
                 WHERE sender_id = ?1 AND receiver_id = ?2 AND status = ?3
                 ORDER BY position ASC LIMIT 1",
                params![
                    from.to_string(),
                    to.to_string(),
                    RequestStatus::Pending.as_str()
                ],
                row_to_request,
            )
            .optional()?;
        Ok(request)
    }

    /// Whether a pending request exists between the two users, in either
    /// direction.
    pub fn has_pending_between(&self, a: &UserId, b: &UserId) -> Result<bool> {
        Ok(self.find_pending_request(a, b)?.is_some()
            || self.find_pending_request(b, a)?.is_some())
    }

    /// Senders of the requests still pending on `receiver`, oldest first.
    pub fn pending_senders(&self, receiver: &UserId) -> Result<Vec<UserId>> {
        let mut stmt = self.conn().prepare(
            "SELECT sender_id FROM connection_requests
             WHERE receiver_id = ?1 AND status = ?2
             ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(
            params![receiver.to_string(), RequestStatus::Pending.as_str()],
            |row| {
                let raw: String = row.get(0)?;
                decode_user_id(0, &raw)
            },
        )?;

        let mut senders = Vec::new();
        for row in rows {
            senders.push(row?);
        }
        Ok(senders)
    }
}
