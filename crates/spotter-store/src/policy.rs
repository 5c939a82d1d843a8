//! Access policy enforced on every store call.
//!
//! - a user writes only its own profile and like edges;
//! - a like edge is readable by its actor and its target;
//! - match and chat documents are created, read and appended to only by
//!   the users they list.

use spotter_shared::{UserId, UserPair};

use crate::error::{Result, StoreError};

pub(crate) fn ensure_owner(caller: &UserId, owner: &UserId, what: &str) -> Result<()> {
    if caller == owner {
        Ok(())
    } else {
        tracing::debug!(%caller, %owner, what, "denied: not the owner");
        Err(StoreError::PermissionDenied(format!(
            "{caller} may not access {what} of {owner}"
        )))
    }
}

pub(crate) fn ensure_like_reader(caller: &UserId, actor: &UserId, target: &UserId) -> Result<()> {
    if caller == actor || caller == target {
        Ok(())
    } else {
        Err(StoreError::PermissionDenied(format!(
            "{caller} may not read the like {actor} -> {target}"
        )))
    }
}

pub(crate) fn ensure_participant(caller: &UserId, users: &UserPair, what: &str) -> Result<()> {
    if users.contains(caller) {
        Ok(())
    } else {
        tracing::debug!(%caller, %users, what, "denied: not a participant");
        Err(StoreError::PermissionDenied(format!(
            "{caller} is not a participant of {what}"
        )))
    }
}
