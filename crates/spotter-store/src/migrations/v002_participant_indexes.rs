//! v002 -- Indexes for "users contains X" queries and message ordering.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_matches_user_low  ON matches(user_low);
CREATE INDEX IF NOT EXISTS idx_matches_user_high ON matches(user_high);
CREATE INDEX IF NOT EXISTS idx_chats_user_low    ON chats(user_low);
CREATE INDEX IF NOT EXISTS idx_chats_user_high   ON chats(user_high);
CREATE INDEX IF NOT EXISTS idx_chats_last_message_at
    ON chats(last_message_at DESC);
CREATE INDEX IF NOT EXISTS idx_messages_chat_order
    ON messages(chat_id, created_at ASC, id ASC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
