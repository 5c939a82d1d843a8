//! # spotter-store
//!
//! The directory store behind spotter: users, their like edges, matches,
//! chat channels and messages.
//!
//! [`DirectoryStore`] is the async seam the client talks to. [`Database`]
//! implements it on top of SQLite, assigning server timestamps, enforcing
//! the access policy on every call, and publishing a change feed that
//! drives [`LiveQuery`] subscriptions.

pub mod chats;
pub mod clock;
pub mod database;
pub mod directory;
pub mod likes;
pub mod matches;
pub mod messages;
pub mod migrations;
pub mod subscription;
pub mod users;

mod error;
mod policy;

pub use database::Database;
pub use directory::{Change, ChatPatch, Collection, CreateOutcome, DirectoryStore, WriteMode};
pub use error::{Result, StoreError};
pub use subscription::{LiveQuery, Subscription, SubscriptionError, SubscriptionHandle};
