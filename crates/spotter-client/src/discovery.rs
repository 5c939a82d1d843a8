//! The swipe feed.

use tracing::debug;

use spotter_shared::protocol::UserProfile;

use crate::error::Result;
use crate::session::Session;

impl Session {
    /// Every profile except the caller's own, ordered by id.
    ///
    /// People already liked or matched are not filtered out; the feed is a
    /// plain directory listing.
    pub async fn candidates(&self) -> Result<Vec<UserProfile>> {
        let users = self.store().list_users(self.me()).await?;
        let candidates: Vec<UserProfile> = users
            .into_iter()
            .filter(|profile| &profile.id != self.me())
            .collect();
        debug!(count = candidates.len(), "loaded candidates");
        Ok(candidates)
    }
}
