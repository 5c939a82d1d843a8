//! Deterministic identifiers derived from an unordered user pair.
//!
//! Both participants compute the same key independently, whichever of them
//! acts first. Because [`UserId`] never contains the separator, distinct
//! pairs always yield distinct keys.

use serde::{Deserialize, Serialize};

use crate::constants::PAIR_KEY_SEPARATOR;
use crate::error::PairError;
use crate::types::{UserId, UserPair};

/// Identifier of the chat channel between two users: `max + "_" + min`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelKey {
    key: String,
    pair: UserPair,
}

impl ChannelKey {
    pub fn derive(a: &UserId, b: &UserId) -> Result<Self, PairError> {
        let pair = UserPair::new(a.clone(), b.clone())?;
        Ok(Self::for_pair(&pair))
    }

    pub fn for_pair(pair: &UserPair) -> Self {
        Self {
            key: format!("{}{}{}", pair.high(), PAIR_KEY_SEPARATOR, pair.low()),
            pair: pair.clone(),
        }
    }

    pub fn participants(&self) -> &UserPair {
        &self.pair
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

/// Identifier of the match document between two users: `min + "_" + max`.
///
/// Used for conditional create-if-absent so concurrent detection passes
/// collapse onto a single document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MatchKey(String);

impl MatchKey {
    pub fn derive(a: &UserId, b: &UserId) -> Result<Self, PairError> {
        let pair = UserPair::new(a.clone(), b.clone())?;
        Ok(Self::for_pair(&pair))
    }

    pub fn for_pair(pair: &UserPair) -> Self {
        Self(format!("{}{}{}", pair.low(), PAIR_KEY_SEPARATOR, pair.high()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn split_key(s: &str) -> Result<(UserId, UserId), PairError> {
    let (first, second) = s
        .split_once(PAIR_KEY_SEPARATOR)
        .ok_or_else(|| PairError::MalformedKey(s.to_string()))?;
    Ok((UserId::parse(first)?, UserId::parse(second)?))
}

impl TryFrom<String> for ChannelKey {
    type Error = PairError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let (high, low) = split_key(&s)?;
        if high <= low {
            return Err(PairError::MalformedKey(s));
        }
        let pair = UserPair::new(high, low)?;
        Ok(Self { key: s, pair })
    }
}

impl TryFrom<String> for MatchKey {
    type Error = PairError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let (low, high) = split_key(&s)?;
        if low >= high {
            return Err(PairError::MalformedKey(s));
        }
        Ok(Self(s))
    }
}

impl std::str::FromStr for ChannelKey {
    type Err = PairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

impl From<ChannelKey> for String {
    fn from(key: ChannelKey) -> Self {
        key.key
    }
}

impl From<MatchKey> for String {
    fn from(key: MatchKey) -> Self {
        key.0
    }
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key)
    }
}

impl std::fmt::Display for MatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    #[test]
    fn test_channel_key_is_order_independent() {
        let a = uid("alice");
        let b = uid("bob");
        let k1 = ChannelKey::derive(&a, &b).unwrap();
        let k2 = ChannelKey::derive(&b, &a).unwrap();
        assert_eq!(k1, k2);
        assert_eq!(k1.as_str(), "bob_alice");
    }

    #[test]
    fn test_match_key_is_min_then_max() {
        let key = MatchKey::derive(&uid("zed"), &uid("amy")).unwrap();
        assert_eq!(key.as_str(), "amy_zed");
    }

    #[test]
    fn test_self_pair_has_no_key() {
        assert!(ChannelKey::derive(&uid("amy"), &uid("amy")).is_err());
        assert!(MatchKey::derive(&uid("amy"), &uid("amy")).is_err());
    }

    #[test]
    fn test_keys_do_not_collide_across_pairs() {
        // Prefix-heavy ids are where a naive concatenation would collide.
        let ids: Vec<UserId> = ["a", "ab", "abc", "b", "ba", "bab", "A", "a1", "1a"]
            .iter()
            .map(|s| uid(s))
            .collect();

        let mut channel_keys = HashSet::new();
        let mut match_keys = HashSet::new();
        let mut pairs = 0;
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                pairs += 1;
                assert!(channel_keys.insert(ChannelKey::derive(a, b).unwrap()));
                assert!(match_keys.insert(MatchKey::derive(a, b).unwrap()));
            }
        }
        assert_eq!(channel_keys.len(), pairs);
        assert_eq!(match_keys.len(), pairs);
    }

    #[test]
    fn test_channel_key_participants() {
        let key = ChannelKey::derive(&uid("amy"), &uid("zed")).unwrap();
        let pair = key.participants();
        assert_eq!(pair.low().as_str(), "amy");
        assert_eq!(pair.high().as_str(), "zed");
    }

    #[test]
    fn test_parse_rejects_non_canonical_keys() {
        assert!("zed_amy".parse::<ChannelKey>().is_ok());
        assert!("amy_zed".parse::<ChannelKey>().is_err());
        assert!("amy".parse::<ChannelKey>().is_err());
        assert!("amy_amy".parse::<ChannelKey>().is_err());
        assert!(MatchKey::try_from("amy_zed".to_string()).is_ok());
        assert!(MatchKey::try_from("zed_amy".to_string()).is_err());
    }
}
