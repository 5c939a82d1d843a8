use thiserror::Error;

use spotter_shared::{ChannelKey, IdentityError, PairError};
use spotter_store::{StoreError, SubscriptionError};

use crate::matching::DetectionStep;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The store's access policy rejected a write. Not retried.
    #[error("Write denied: {0}")]
    WriteDenied(String),

    /// A read during match detection failed. Nothing was committed, so the
    /// whole detection can be retried from the reciprocal lookup.
    #[error("Match detection failed during {step}: {source}")]
    DetectionFailed {
        step: DetectionStep,
        #[source]
        source: StoreError,
    },

    /// The chat channel could not be created or merged. Retried on the next
    /// chat open.
    #[error("Could not set up chat {key}: {source}")]
    ChannelBootstrapFailed {
        key: ChannelKey,
        #[source]
        source: StoreError,
    },

    /// A live subscription died. Resubscribe or surface the error.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// A message could not be sent. `unsent` holds the text so the caller
    /// can put it back in the input.
    #[error("Message not sent: {source}")]
    SendFailed {
        unsent: String,
        #[source]
        source: StoreError,
    },

    #[error("Profile incomplete: {0} is required")]
    IncompleteProfile(&'static str),

    #[error("Invalid pair: {0}")]
    InvalidPair(#[from] PairError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ClientError {
    /// Map a failed write, keeping policy rejections distinct.
    pub(crate) fn from_write(err: StoreError) -> Self {
        if err.is_permission_denied() {
            ClientError::WriteDenied(err.to_string())
        } else {
            ClientError::Store(err)
        }
    }

    /// Whether repeating the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::DetectionFailed { .. }
            | ClientError::ChannelBootstrapFailed { .. }
            | ClientError::Subscription(_) => true,
            ClientError::SendFailed { source, .. } => !source.is_permission_denied(),
            ClientError::Store(e) => !e.is_permission_denied(),
            ClientError::WriteDenied(_)
            | ClientError::IncompleteProfile(_)
            | ClientError::InvalidPair(_)
            | ClientError::Identity(_) => false,
        }
    }

    /// Text to restore into the message input, if this was a failed send.
    pub fn unsent_text(&self) -> Option<&str> {
        match self {
            ClientError::SendFailed { unsent, .. } => Some(unsent),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
