use rusqlite::params;
use uuid::Uuid;

use spotter_shared::constants::{CHATS_COLLECTION, MESSAGES_COLLECTION};
use spotter_shared::protocol::{ChatMessage, NewMessage};
use spotter_shared::{ChannelKey, UserId};

use crate::clock::from_micros;
use crate::database::{conversion_error, Database};
use crate::directory::Collection;
use crate::error::{Result, StoreError};
use crate::policy;

impl Database {
    /// Append a message to an existing channel.
    ///
    /// The sender must be the caller and the receiver the other participant.
    pub fn append_message(
        &self,
        caller: &UserId,
        key: &ChannelKey,
        message: &NewMessage,
    ) -> Result<ChatMessage> {
        policy::ensure_owner(caller, &message.sender_id, "messages sent as")?;
        let channel = self.require_chat(caller, key)?;
        if channel.users.other(caller) != Some(&message.receiver_id) {
            return Err(StoreError::Invalid(format!(
                "{} is not the other participant of {key}",
                message.receiver_id
            )));
        }

        let stored = ChatMessage {
            id: Uuid::new_v4().simple().to_string(),
            text: message.text.clone(),
            sender_id: message.sender_id.clone(),
            receiver_id: message.receiver_id.clone(),
            created_at: self.clock().now(),
        };

        self.conn()?.execute(
            "INSERT INTO messages (id, chat_id, sender_id, receiver_id, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                stored.id,
                key.as_str(),
                stored.sender_id.as_str(),
                stored.receiver_id.as_str(),
                stored.text,
                stored.created_at.timestamp_micros(),
            ],
        )?;

        self.publish(
            Collection::Messages,
            format!("{CHATS_COLLECTION}/{key}/{MESSAGES_COLLECTION}/{}", stored.id),
        );
        Ok(stored)
    }

    /// All messages of a channel, ordered by server timestamp then id.
    pub fn messages(&self, caller: &UserId, key: &ChannelKey) -> Result<Vec<ChatMessage>> {
        self.require_chat(caller, key)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, sender_id, receiver_id, text, created_at
             FROM messages
             WHERE chat_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![key.as_str()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    let id: String = row.get(0)?;
    let sender: String = row.get(1)?;
    let receiver: String = row.get(2)?;
    let text: String = row.get(3)?;
    let created: i64 = row.get(4)?;

    Ok(ChatMessage {
        id,
        text,
        sender_id: UserId::parse(sender).map_err(|e| conversion_error(1, e))?,
        receiver_id: UserId::parse(receiver).map_err(|e| conversion_error(2, e))?,
        created_at: from_micros(created),
    })
}
