//! Message Append Path.

use tracing::{debug, warn};

use spotter_shared::protocol::{ChatMessage, NewMessage};
use spotter_shared::{ChannelKey, UserId};
use spotter_store::{ChatPatch, DirectoryStore, StoreError};

use crate::error::{ClientError, Result};
use crate::session::Session;

/// Send `text` from `me` to `counterpart`.
///
/// Blank text is a no-op and returns `Ok(None)`. Otherwise the channel
/// summary is merged first (which also creates the channel on a first
/// send) and the message appended after it. On failure the trimmed text
/// comes back in [`ClientError::SendFailed`].
pub(crate) async fn send(
    store: &dyn DirectoryStore,
    me: &UserId,
    counterpart: &UserId,
    text: &str,
) -> Result<Option<ChatMessage>> {
    let text = text.trim();
    if text.is_empty() {
        debug!("ignoring blank message");
        return Ok(None);
    }
    let key = ChannelKey::derive(me, counterpart)?;

    let failed = |source: StoreError| {
        warn!(chat = %key, error = %source, "message not sent");
        ClientError::SendFailed {
            unsent: text.to_string(),
            source,
        }
    };

    store
        .merge_chat(me, &key, &ChatPatch::last_message(text))
        .await
        .map_err(failed)?;

    let message = NewMessage {
        sender_id: me.clone(),
        receiver_id: counterpart.clone(),
        text: text.to_string(),
    };
    let stored = store
        .append_message(me, &key, &message)
        .await
        .map_err(failed)?;

    debug!(chat = %key, id = %stored.id, "message sent");
    Ok(Some(stored))
}

impl Session {
    pub async fn send_message(
        &self,
        counterpart: &UserId,
        text: &str,
    ) -> Result<Option<ChatMessage>> {
        send(self.store().as_ref(), self.me(), counterpart, text).await
    }
}
