use serde::{Deserialize, Serialize};

use crate::constants::{MAX_USER_ID_LEN, PAIR_KEY_SEPARATOR};
use crate::error::{IdentityError, PairError};

/// Stable, opaque identity of an account as issued by the auth provider.
///
/// Identities never contain the pair key separator, a path separator or
/// whitespace, so they can be embedded in document paths and pair keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn parse(s: impl Into<String>) -> Result<Self, IdentityError> {
        let s = s.into();
        if s.is_empty() {
            return Err(IdentityError::Empty);
        }
        if s.len() > MAX_USER_ID_LEN {
            return Err(IdentityError::TooLong {
                max: MAX_USER_ID_LEN,
            });
        }
        if let Some(c) = s
            .chars()
            .find(|c| *c == PAIR_KEY_SEPARATOR || *c == '/' || c.is_whitespace())
        {
            return Err(IdentityError::ForbiddenChar(c));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = IdentityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// Unordered pair of two distinct users.
///
/// Always held in ascending order, so `UserPair::new(a, b) == UserPair::new(b, a)`.
/// Serialized as the two-element `users` array of match and chat documents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<UserId>", into = "Vec<UserId>")]
pub struct UserPair {
    low: UserId,
    high: UserId,
}

impl UserPair {
    pub fn new(a: UserId, b: UserId) -> Result<Self, PairError> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Ok(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Ok(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => Err(PairError::SameUser(a.0)),
        }
    }

    /// Lexicographically smaller member.
    pub fn low(&self) -> &UserId {
        &self.low
    }

    /// Lexicographically greater member.
    pub fn high(&self) -> &UserId {
        &self.high
    }

    pub fn contains(&self, user: &UserId) -> bool {
        &self.low == user || &self.high == user
    }

    /// The member that is not `user`, or `None` if `user` is not in the pair.
    pub fn other(&self, user: &UserId) -> Option<&UserId> {
        if &self.low == user {
            Some(&self.high)
        } else if &self.high == user {
            Some(&self.low)
        } else {
            None
        }
    }

    pub fn to_vec(&self) -> Vec<UserId> {
        vec![self.low.clone(), self.high.clone()]
    }
}

impl TryFrom<Vec<UserId>> for UserPair {
    type Error = PairError;

    fn try_from(users: Vec<UserId>) -> Result<Self, Self::Error> {
        let mut it = users.into_iter();
        match (it.next(), it.next(), it.next()) {
            (Some(a), Some(b), None) => Self::new(a, b),
            _ => Err(PairError::MalformedKey(
                "users must hold exactly two identities".into(),
            )),
        }
    }
}

impl From<UserPair> for Vec<UserId> {
    fn from(pair: UserPair) -> Self {
        vec![pair.low, pair.high]
    }
}

impl std::fmt::Display for UserPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}, {}}}", self.low, self.high)
    }
}
