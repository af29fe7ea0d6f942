//! Identity store.
//!
//! A user's `connections` and `connection_requests` are embedded lists: they
//! are always loaded with the user and written back as a whole by
//! [`Database::save_user`].

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use devconnect_shared::types::{RequestStatus, UserId};

use crate::database::{decode_ts, decode_user_id, encode_ts, now, Database};
use crate::error::{Result, StoreError};
use crate::models::{ConnectionRequest, NewUser, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, bio, skills, profile_picture,
     github, linkedin, is_online, last_seen, created_at, updated_at";

impl Database {
    pub fn create_user(&self, new_user: NewUser) -> Result<User> {
        let email = normalize_email(&new_user.email);
        if self.find_user_by_email(&email)?.is_some() {
            return Err(StoreError::DuplicateEmail(email));
        }

        let now = now();
        let user = User {
            id: UserId::new(),
            name: new_user.name.trim().to_string(),
            email,
            password_hash: new_user.password_hash,
            bio: new_user.bio.trim().to_string(),
            skills: clean_skills(new_user.skills),
            profile_picture: new_user.profile_picture,
            github: new_user.github.trim().to_string(),
            linkedin: new_user.linkedin.trim().to_string(),
            connections: Vec::new(),
            connection_requests: Vec::new(),
            is_online: false,
            last_seen: now,
            created_at: now,
            updated_at: now,
        };

        self.conn().execute(
            "INSERT INTO users (id, name, email, password_hash, bio, skills, profile_picture,
                                github, linkedin, is_online, last_seen, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.password_hash,
                user.bio,
                serde_json::to_string(&user.skills)?,
                user.profile_picture,
                user.github,
                user.linkedin,
                user.is_online,
                encode_ts(&user.last_seen),
                encode_ts(&user.created_at),
                encode_ts(&user.updated_at),
            ],
        )?;

        tracing::debug!(user = %user.id, "created user");
        Ok(user)
    }

    pub fn find_user(&self, id: &UserId) -> Result<Option<User>> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .optional()?;

        match row {
            Some(user) => Ok(Some(self.hydrate(user)?)),
            None => Ok(None),
        }
    }

    /// Like [`Database::find_user`], but a missing user is an error.
    pub fn get_user(&self, id: &UserId) -> Result<User> {
        self.find_user(id)?.ok_or(StoreError::NotFound)
    }

    /// Case-insensitive lookup by email address.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![normalize_email(email)],
                row_to_user,
            )
            .optional()?;

        match row {
            Some(user) => Ok(Some(self.hydrate(user)?)),
            None => Ok(None),
        }
    }

    /// Load several users, preserving the order of `ids`. Unknown ids are
    /// skipped.
    pub fn find_users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.find_user(id)? {
                users.push(user);
            }
        }
        Ok(users)
    }

    /// Every user except `id`, oldest registration first.
    pub fn list_users_except(&self, id: &UserId) -> Result<Vec<User>> {
        let ids = self.query_ids(
            "SELECT id FROM users WHERE id != ?1 ORDER BY created_at ASC, rowid ASC",
            &id.to_string(),
        )?;
        self.find_users_by_ids(&ids)
    }

    /// Users whose connection list contains `id` (reverse lookup).
    pub fn find_users_listing(&self, id: &UserId) -> Result<Vec<User>> {
        let ids = self.query_ids(
            "SELECT DISTINCT u.id FROM users u
             JOIN user_connections c ON c.user_id = u.id
             WHERE c.peer_id = ?1
             ORDER BY u.created_at ASC",
            &id.to_string(),
        )?;
        self.find_users_by_ids(&ids)
    }

    /// Persist a user's profile fields and embedded lists in one transaction.
    ///
    /// Presence fields are not written here; see [`Database::set_presence`].
    pub fn save_user(&self, user: &User) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        let id = user.id.to_string();

        let affected = tx.execute(
            "UPDATE users SET name = ?2, email = ?3, password_hash = ?4, bio = ?5, skills = ?6,
                    profile_picture = ?7, github = ?8, linkedin = ?9, updated_at = ?10
             WHERE id = ?1",
            params![
                id,
                user.name,
                normalize_email(&user.email),
                user.password_hash,
                user.bio,
                serde_json::to_string(&user.skills)?,
                user.profile_picture,
                user.github,
                user.linkedin,
                encode_ts(&now()),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        tx.execute("DELETE FROM user_connections WHERE user_id = ?1", params![id])?;
        for (position, peer) in user.connections.iter().enumerate() {
            tx.execute(
                "INSERT INTO user_connections (user_id, peer_id, position) VALUES (?1, ?2, ?3)",
                params![id, peer.to_string(), position as i64],
            )?;
        }

        tx.execute(
            "DELETE FROM connection_requests WHERE receiver_id = ?1",
            params![id],
        )?;
        for (position, request) in user.connection_requests.iter().enumerate() {
            tx.execute(
                "INSERT INTO connection_requests (receiver_id, sender_id, status, created_at, position)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id,
                    request.from.to_string(),
                    request.status.as_str(),
                    encode_ts(&request.created_at),
                    position as i64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Update the online flag and last-seen stamp. Returns `false` when the
    /// user does not exist.
    pub fn set_presence(&self, id: &UserId, online: bool, last_seen: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE users SET is_online = ?2, last_seen = ?3 WHERE id = ?1",
            params![id.to_string(), online, encode_ts(&last_seen)],
        )?;
        Ok(affected > 0)
    }

    fn query_ids(&self, sql: &str, param: &str) -> Result<Vec<UserId>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params![param], |row| {
            let raw: String = row.get(0)?;
            decode_user_id(0, &raw)
        })?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn hydrate(&self, mut user: User) -> Result<User> {
        let id = user.id.to_string();

        let mut stmt = self.conn().prepare(
            "SELECT peer_id FROM user_connections WHERE user_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            let raw: String = row.get(0)?;
            decode_user_id(0, &raw)
        })?;
        for row in rows {
            user.connections.push(row?);
        }

        let mut stmt = self.conn().prepare(
            "SELECT sender_id, status, created_at FROM connection_requests
             WHERE receiver_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![id], row_to_request)?;
        for row in rows {
            user.connection_requests.push(row?);
        }

        Ok(user)
    }
}

pub(crate) fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConnectionRequest> {
    let from_raw: String = row.get(0)?;
    let status_raw: String = row.get(1)?;
    let created_raw: String = row.get(2)?;

    let status: RequestStatus = status_raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            Box::new(StoreError::Corrupt(e)),
        )
    })?;

    Ok(ConnectionRequest {
        from: decode_user_id(0, &from_raw)?,
        status,
        created_at: decode_ts(2, &created_raw)?,
    })
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_raw: String = row.get(0)?;
    let skills_raw: String = row.get(5)?;
    let last_seen_raw: String = row.get(10)?;
    let created_raw: String = row.get(11)?;
    let updated_raw: String = row.get(12)?;

    let skills: Vec<String> = serde_json::from_str(&skills_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(User {
        id: decode_user_id(0, &id_raw)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        bio: row.get(4)?,
        skills,
        profile_picture: row.get(6)?,
        github: row.get(7)?,
        linkedin: row.get(8)?,
        connections: Vec::new(),
        connection_requests: Vec::new(),
        is_online: row.get(9)?,
        last_seen: decode_ts(10, &last_seen_raw)?,
        created_at: decode_ts(11, &created_raw)?,
        updated_at: decode_ts(12, &updated_raw)?,
    })
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn clean_skills(skills: Vec<String>) -> Vec<String> {
    skills
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
