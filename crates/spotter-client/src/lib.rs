//! # spotter-client
//!
//! Client session logic for the spotter gym-partner app: recording likes,
//! detecting mutual matches, surfacing new matches, and bootstrapping and
//! using the per-match chat channel.
//!
//! Everything hangs off a [`Session`], the explicit context object holding
//! the store handle and the signed-in identity. Live subscriptions opened
//! through a session are tracked in its [`SubscriptionScope`] and cancelled
//! on [`Session::sign_out`].

pub mod chat;
pub mod config;
pub mod discovery;
pub mod error;
pub mod likes;
pub mod matching;
pub mod messaging;
pub mod notifier;
pub mod profile;
pub mod scope;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::{ChatRoom, ChatSummary};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use likes::SwipeOutcome;
pub use matching::{Detection, DetectionStep, MatchStrategy};
pub use notifier::{MatchNotifier, NewMatch};
pub use profile::ProfileDraft;
pub use scope::SubscriptionScope;
pub use session::Session;
