//! # spotter-shared
//!
//! Types shared by every spotter crate: user identities, the deterministic
//! pair keys used for matches and chat channels, and the document models
//! exchanged with the directory store.

pub mod constants;
pub mod error;
pub mod keys;
pub mod protocol;
pub mod types;

pub use error::{IdentityError, PairError};
pub use keys::{ChannelKey, MatchKey};
pub use types::{UserId, UserPair};
