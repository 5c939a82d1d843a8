//! v001 -- Initial schema creation.
//!
//! Creates the five collections: `users`, `likes`, `matches`, `chats`
//! and `messages`. Timestamps are server-assigned microseconds since the
//! Unix epoch.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (profile documents)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY NOT NULL,
    name         TEXT NOT NULL,
    gym_name     TEXT NOT NULL,
    workout_type TEXT NOT NULL,
    timing       TEXT NOT NULL,
    email        TEXT,
    photo_url    TEXT,
    created_at   INTEGER,
    updated_at   INTEGER
);

-- ----------------------------------------------------------------
-- Likes: users/{actor_id}/likes/{target_id}
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS likes (
    actor_id  TEXT NOT NULL,
    target_id TEXT NOT NULL,
    liked     INTEGER NOT NULL DEFAULT 1,   -- boolean 0/1
    timestamp INTEGER NOT NULL,

    PRIMARY KEY (actor_id, target_id)
);

-- ----------------------------------------------------------------
-- Matches: participants held in ascending order
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS matches (
    id         TEXT PRIMARY KEY NOT NULL,   -- auto id or deterministic pair key
    user_low   TEXT NOT NULL,
    user_high  TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

-- ----------------------------------------------------------------
-- Chats: keyed by the canonical channel key
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    id              TEXT PRIMARY KEY NOT NULL,
    user_low        TEXT NOT NULL,
    user_high       TEXT NOT NULL,
    created_at      INTEGER NOT NULL,
    last_message    TEXT,
    last_message_at INTEGER NOT NULL
);

-- ----------------------------------------------------------------
-- Messages: chats/{chat_id}/messages/{id}, append-only
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id          TEXT PRIMARY KEY NOT NULL,
    chat_id     TEXT NOT NULL,
    sender_id   TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    text        TEXT NOT NULL,
    created_at  INTEGER NOT NULL,

    FOREIGN KEY (chat_id) REFERENCES chats(id)
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
