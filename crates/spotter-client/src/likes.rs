//! Like Recorder and the swipe actions built on it.

use tracing::{debug, info};

use spotter_shared::protocol::LikeEdge;
use spotter_shared::{UserId, UserPair};

use crate::error::{ClientError, Result};
use crate::matching::Detection;
use crate::session::Session;

/// Result of a right swipe: the stored edge and what detection found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwipeOutcome {
    pub like: LikeEdge,
    pub detection: Detection,
}

impl Session {
    /// Record that the signed-in user likes `target`.
    pub async fn record_like(&self, target: &UserId) -> Result<LikeEdge> {
        self.record_like_as(self.me(), target).await
    }

    /// Record the edge `actor -> target`. Only the signed-in user may act,
    /// which the store enforces.
    pub async fn record_like_as(&self, actor: &UserId, target: &UserId) -> Result<LikeEdge> {
        UserPair::new(actor.clone(), target.clone())?;
        let edge = self
            .store()
            .put_like(self.me(), actor, target)
            .await
            .map_err(ClientError::from_write)?;
        debug!(actor = %actor.short(), target = %target.short(), "like recorded");
        Ok(edge)
    }

    /// Like `target`, then check whether the like is reciprocated.
    ///
    /// A detection failure leaves the like in place; calling this again is
    /// safe since re-liking just refreshes the edge.
    pub async fn swipe_right(&self, target: &UserId) -> Result<SwipeOutcome> {
        let like = self.record_like(target).await?;
        let detection = self.detect_match(target).await?;
        if let Detection::Created(record) = &detection {
            info!(id = %record.id, "new match from swipe");
        }
        Ok(SwipeOutcome { like, detection })
    }

    /// Pass on `target`. Nothing is stored.
    pub fn swipe_left(&self, target: &UserId) {
        debug!(target = %target.short(), "passed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{match_docs, session, shared_db, uid};

    #[tokio::test]
    async fn test_relike_is_a_single_edge() {
        let db = shared_db();
        let amy = session(&db, "amy");
        amy.record_like(&uid("zed")).await.unwrap();
        amy.record_like(&uid("zed")).await.unwrap();
        assert_eq!(db.likes_from(&uid("amy"), &uid("amy")).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cannot_like_as_someone_else() {
        let db = shared_db();
        let amy = session(&db, "amy");
        let err = amy.record_like_as(&uid("zed"), &uid("amy")).await.unwrap_err();
        assert!(matches!(err, ClientError::WriteDenied(_)));
        assert!(db.likes_from(&uid("zed"), &uid("zed")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_self_like_is_invalid() {
        let db = shared_db();
        let amy = session(&db, "amy");
        assert!(matches!(
            amy.record_like(&uid("amy")).await,
            Err(ClientError::InvalidPair(_))
        ));
    }

    #[tokio::test]
    async fn test_swipes() {
        let db = shared_db();
        let amy = session(&db, "amy");
        let zed = session(&db, "zed");

        amy.swipe_left(&uid("bob"));
        assert!(db.likes_from(&uid("amy"), &uid("amy")).unwrap().is_empty());

        let first = amy.swipe_right(&uid("zed")).await.unwrap();
        assert_eq!(first.detection, Detection::NotReciprocated);
        assert!(first.like.liked);

        let second = zed.swipe_right(&uid("amy")).await.unwrap();
        assert!(matches!(second.detection, Detection::Created(_)));
        assert_eq!(match_docs(&db, "amy").len(), 1);
    }
}
