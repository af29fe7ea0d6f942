//! v001 -- Initial schema creation.
//!
//! Creates `users`, the two tables holding each user's embedded lists
//! (`user_connections`, `connection_requests`), and the `messages` log.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id              TEXT PRIMARY KEY NOT NULL,      -- UUID v4
    name            TEXT NOT NULL,
    email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash   TEXT NOT NULL,                  -- argon2 PHC string
    bio             TEXT NOT NULL DEFAULT '',
    skills          TEXT NOT NULL DEFAULT '[]',     -- JSON array of strings
    profile_picture TEXT NOT NULL DEFAULT '',
    github          TEXT NOT NULL DEFAULT '',
    linkedin        TEXT NOT NULL DEFAULT '',
    is_online       INTEGER NOT NULL DEFAULT 0,     -- boolean 0/1
    last_seen       TEXT NOT NULL,                  -- RFC-3339
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Connections (ordered list embedded in each user)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS user_connections (
    user_id  TEXT NOT NULL,                         -- owner of the list
    peer_id  TEXT NOT NULL,
    position INTEGER NOT NULL,

    PRIMARY KEY (user_id, position),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_user_connections_peer ON user_connections(peer_id);

-- ----------------------------------------------------------------
-- Connection requests (embedded in the receiving user)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS connection_requests (
    receiver_id TEXT NOT NULL,
    sender_id   TEXT NOT NULL,
    status      TEXT NOT NULL,                      -- pending / accepted / rejected
    created_at  TEXT NOT NULL,
    position    INTEGER NOT NULL,

    PRIMARY KEY (receiver_id, position),
    FOREIGN KEY (receiver_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_requests_pair
    ON connection_requests(sender_id, receiver_id, status);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order
    id              TEXT NOT NULL UNIQUE,               -- UUID v4
    conversation_id TEXT NOT NULL,
    sender_id       TEXT NOT NULL,
    receiver_id     TEXT NOT NULL,
    content         TEXT NOT NULL,
    is_read         INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(conversation_id, created_at);
CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender_id);
CREATE INDEX IF NOT EXISTS idx_messages_receiver ON messages(receiver_id, is_read);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
