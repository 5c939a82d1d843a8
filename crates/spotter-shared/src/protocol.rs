//! Documents exchanged with the directory store.
//!
//! Field names on the wire follow the store's collections:
//!
//! | Path | Fields |
//! |---|---|
//! | `users/{id}` | name, gymName, workoutType, timing, email, photoURL, createdAt, updatedAt |
//! | `users/{id}/likes/{targetId}` | liked, timestamp |
//! | `matches/{id}` | users, createdAt |
//! | `chats/{pairKey}` | users, createdAt, lastMessage, lastMessageTimestamp |
//! | `chats/{pairKey}/messages/{id}` | text, senderId, receiverId, createdAt |
//!
//! Each model also carries the id of the document it was read from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys::ChannelKey;
use crate::types::{UserId, UserPair};

/// Editable profile attributes of a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    pub name: String,
    pub gym_name: String,
    pub workout_type: String,
    pub timing: String,
    pub email: Option<String>,
    /// Photo reference (URL or inline data URL).
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

/// `users/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "userId")]
    pub id: UserId,
    #[serde(flatten)]
    pub fields: ProfileFields,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Name to show for this user, falling back when the profile has none.
    pub fn display_name(&self) -> &str {
        if self.fields.name.trim().is_empty() {
            "a gym buddy"
        } else {
            &self.fields.name
        }
    }
}

/// `users/{actor}/likes/{target}`: the actor is interested in the target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LikeEdge {
    pub actor: UserId,
    pub target: UserId,
    pub liked: bool,
    pub timestamp: DateTime<Utc>,
}

/// `matches/{id}`: established mutual interest between two users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub id: String,
    pub users: UserPair,
    pub created_at: DateTime<Utc>,
}

/// `chats/{pairKey}`: the channel document with its list-view summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatChannel {
    pub id: ChannelKey,
    pub users: UserPair,
    pub created_at: DateTime<Utc>,
    pub last_message: Option<String>,
    pub last_message_timestamp: DateTime<Utc>,
}

/// `chats/{pairKey}/messages/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// A message about to be appended; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_uses_wire_field_names() {
        let profile = UserProfile {
            id: UserId::parse("amy").unwrap(),
            fields: ProfileFields {
                name: "Amy".into(),
                gym_name: "Iron Works".into(),
                workout_type: "Weightlifting".into(),
                timing: "Morning".into(),
                email: None,
                photo_url: Some("data:image/jpeg;base64,AAAA".into()),
            },
            created_at: None,
            updated_at: None,
        };

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["userId"], "amy");
        assert_eq!(value["gymName"], "Iron Works");
        assert_eq!(value["workoutType"], "Weightlifting");
        assert_eq!(value["photoURL"], "data:image/jpeg;base64,AAAA");
    }

    #[test]
    fn test_chat_channel_wire_names() {
        let a = UserId::parse("amy").unwrap();
        let b = UserId::parse("zed").unwrap();
        let pair = UserPair::new(a, b).unwrap();
        let now = Utc::now();
        let channel = ChatChannel {
            id: ChannelKey::for_pair(&pair),
            users: pair,
            created_at: now,
            last_message: None,
            last_message_timestamp: now,
        };

        let value = serde_json::to_value(&channel).unwrap();
        assert_eq!(value["id"], "zed_amy");
        assert_eq!(value["users"], serde_json::json!(["amy", "zed"]));
        assert!(value["lastMessage"].is_null());
        assert!(value.get("lastMessageTimestamp").is_some());
    }

    #[test]
    fn test_display_name_fallback() {
        let mut profile = UserProfile {
            id: UserId::parse("amy").unwrap(),
            fields: ProfileFields::default(),
            created_at: None,
            updated_at: None,
        };
        assert_eq!(profile.display_name(), "a gym buddy");
        profile.fields.name = "Amy".into();
        assert_eq!(profile.display_name(), "Amy");
    }
}
