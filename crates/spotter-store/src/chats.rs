//! Chat channel documents: `chats/{pairKey}`.

use rusqlite::{params, OptionalExtension};

use spotter_shared::constants::CHATS_COLLECTION;
use spotter_shared::protocol::ChatChannel;
use spotter_shared::{ChannelKey, UserId, UserPair};

use crate::clock::from_micros;
use crate::database::{conversion_error, Database};
use crate::directory::{ChatPatch, Collection};
use crate::error::{Result, StoreError};
use crate::policy;

const SELECT_CHAT: &str = "SELECT id, user_low, user_high, created_at, last_message, last_message_at
 FROM chats";

impl Database {
    /// Upsert a chat document with merge semantics.
    ///
    /// Creating stamps `createdAt` and `lastMessageTimestamp`; merging into an
    /// existing document never touches `createdAt` or the participants, so
    /// both sides bootstrapping at once converge on the same document.
    pub fn merge_chat(
        &self,
        caller: &UserId,
        key: &ChannelKey,
        patch: &ChatPatch,
    ) -> Result<ChatChannel> {
        let users = key.participants();
        policy::ensure_participant(caller, users, "the chat")?;

        let now = self.clock().now().timestamp_micros();
        let channel = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;

            let exists = tx
                .query_row(
                    "SELECT 1 FROM chats WHERE id = ?1",
                    params![key.as_str()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();

            if exists {
                tx.execute(
                    "UPDATE chats SET
                         last_message    = COALESCE(?2, last_message),
                         last_message_at = CASE WHEN ?3 THEN ?4 ELSE last_message_at END
                     WHERE id = ?1",
                    params![
                        key.as_str(),
                        patch.last_message,
                        patch.touch_last_message_at,
                        now
                    ],
                )?;
            } else {
                tx.execute(
                    "INSERT INTO chats
                         (id, user_low, user_high, created_at, last_message, last_message_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?4)",
                    params![
                        key.as_str(),
                        users.low().as_str(),
                        users.high().as_str(),
                        now,
                        patch.last_message,
                    ],
                )?;
                tracing::info!(chat = %key, "chat channel created");
            }

            let channel = tx.query_row(
                &format!("{SELECT_CHAT} WHERE id = ?1"),
                params![key.as_str()],
                row_to_chat,
            )?;
            tx.commit()?;
            channel
        };

        self.publish(Collection::Chats, format!("{CHATS_COLLECTION}/{key}"));
        Ok(channel)
    }

    /// Read a chat document; only its participants may see it.
    pub fn get_chat(&self, caller: &UserId, key: &ChannelKey) -> Result<Option<ChatChannel>> {
        let channel = self
            .conn()?
            .query_row(
                &format!("{SELECT_CHAT} WHERE id = ?1"),
                params![key.as_str()],
                row_to_chat,
            )
            .optional()?;

        if let Some(ref channel) = channel {
            policy::ensure_participant(caller, &channel.users, "the chat")?;
        }
        Ok(channel)
    }

    /// Read a chat document that must exist and list the caller.
    ///
    /// Message reads and appends are authorised against it, which is why a
    /// channel has to be bootstrapped before any message traffic.
    pub(crate) fn require_chat(&self, caller: &UserId, key: &ChannelKey) -> Result<ChatChannel> {
        self.get_chat(caller, key)?.ok_or_else(|| {
            StoreError::PermissionDenied(format!("chat {key} does not exist"))
        })
    }

    /// Chats listing `user`, most recently active first.
    pub fn chats_for(&self, caller: &UserId, user: &UserId) -> Result<Vec<ChatChannel>> {
        policy::ensure_owner(caller, user, "the chats")?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_CHAT}
             WHERE user_low = ?1 OR user_high = ?1
             ORDER BY last_message_at DESC, id ASC"
        ))?;
        let rows = stmt.query_map(params![user.as_str()], row_to_chat)?;

        let mut chats = Vec::new();
        for row in rows {
            chats.push(row?);
        }
        Ok(chats)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatChannel> {
    let id_str: String = row.get(0)?;
    let low: String = row.get(1)?;
    let high: String = row.get(2)?;
    let created: i64 = row.get(3)?;
    let last_message: Option<String> = row.get(4)?;
    let last_at: i64 = row.get(5)?;

    let id: ChannelKey = id_str.parse().map_err(|e| conversion_error(0, e))?;
    let low = UserId::parse(low).map_err(|e| conversion_error(1, e))?;
    let high = UserId::parse(high).map_err(|e| conversion_error(2, e))?;
    let users = UserPair::new(low, high).map_err(|e| conversion_error(1, e))?;

    Ok(ChatChannel {
        id,
        users,
        created_at: from_micros(created),
        last_message,
        last_message_timestamp: from_micros(last_at),
    })
}
