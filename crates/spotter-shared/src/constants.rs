/// Separator joining the two identities of a pair key.
/// [`crate::UserId`] rejects it so pair keys never collide.
pub const PAIR_KEY_SEPARATOR: char = '_';

/// Maximum length of a user identity in bytes
pub const MAX_USER_ID_LEN: usize = 128;

/// Collection paths in the directory store
pub const USERS_COLLECTION: &str = "users";
pub const LIKES_COLLECTION: &str = "likes";
pub const MATCHES_COLLECTION: &str = "matches";
pub const CHATS_COLLECTION: &str = "chats";
pub const MESSAGES_COLLECTION: &str = "messages";

/// Preview shown for a chat that has no message yet
pub const EMPTY_CHAT_PREVIEW: &str = "Start chatting";

/// Default capacity of a live subscription's delivery buffer
pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 16;

/// Capacity of the store's change feed
pub const CHANGE_FEED_CAPACITY: usize = 256;
