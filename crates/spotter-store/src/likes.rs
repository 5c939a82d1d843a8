//! Like edges: `users/{actor}/likes/{target}`.

use rusqlite::{params, OptionalExtension};

use spotter_shared::constants::{LIKES_COLLECTION, USERS_COLLECTION};
use spotter_shared::protocol::LikeEdge;
use spotter_shared::{UserId, UserPair};

use crate::clock::from_micros;
use crate::database::{conversion_error, Database};
use crate::directory::Collection;
use crate::error::Result;
use crate::policy;

impl Database {
    /// Write the edge `actor -> target`, replacing any previous one.
    ///
    /// Re-liking keeps a single edge per pair and refreshes its timestamp.
    pub fn put_like(&self, caller: &UserId, actor: &UserId, target: &UserId) -> Result<LikeEdge> {
        policy::ensure_owner(caller, actor, "the like edges")?;
        // Rejects self-likes.
        UserPair::new(actor.clone(), target.clone())?;

        let now = self.clock().now();
        self.conn()?.execute(
            "INSERT OR REPLACE INTO likes (actor_id, target_id, liked, timestamp)
             VALUES (?1, ?2, 1, ?3)",
            params![actor.as_str(), target.as_str(), now.timestamp_micros()],
        )?;

        self.publish(
            Collection::Likes,
            format!("{USERS_COLLECTION}/{actor}/{LIKES_COLLECTION}/{target}"),
        );

        Ok(LikeEdge {
            actor: actor.clone(),
            target: target.clone(),
            liked: true,
            timestamp: now,
        })
    }

    /// Read the edge `actor -> target`, visible to both ends of the edge.
    pub fn get_like(
        &self,
        caller: &UserId,
        actor: &UserId,
        target: &UserId,
    ) -> Result<Option<LikeEdge>> {
        policy::ensure_like_reader(caller, actor, target)?;

        let edge = self
            .conn()?
            .query_row(
                "SELECT actor_id, target_id, liked, timestamp
                 FROM likes
                 WHERE actor_id = ?1 AND target_id = ?2",
                params![actor.as_str(), target.as_str()],
                row_to_like,
            )
            .optional()?;
        Ok(edge)
    }

    /// All edges written by `actor`, oldest first.
    pub fn likes_from(&self, caller: &UserId, actor: &UserId) -> Result<Vec<LikeEdge>> {
        policy::ensure_owner(caller, actor, "the like edges")?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT actor_id, target_id, liked, timestamp
             FROM likes
             WHERE actor_id = ?1
             ORDER BY timestamp ASC, target_id ASC",
        )?;
        let rows = stmt.query_map(params![actor.as_str()], row_to_like)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}

fn row_to_like(row: &rusqlite::Row<'_>) -> rusqlite::Result<LikeEdge> {
    let actor_str: String = row.get(0)?;
    let target_str: String = row.get(1)?;
    let liked: bool = row.get(2)?;
    let ts: i64 = row.get(3)?;

    Ok(LikeEdge {
        actor: UserId::parse(actor_str).map_err(|e| conversion_error(0, e))?,
        target: UserId::parse(target_str).map_err(|e| conversion_error(1, e))?,
        liked,
        timestamp: from_micros(ts),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    #[test]
    fn test_relike_keeps_single_edge() {
        let db = Database::open_in_memory().unwrap();
        let (amy, zed) = (uid("amy"), uid("zed"));

        let first = db.put_like(&amy, &amy, &zed).unwrap();
        let second = db.put_like(&amy, &amy, &zed).unwrap();
        assert!(second.timestamp > first.timestamp);

        let edges = db.likes_from(&amy, &amy).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0], second);
    }

    #[test]
    fn test_like_is_directional() {
        let db = Database::open_in_memory().unwrap();
        let (amy, zed) = (uid("amy"), uid("zed"));

        db.put_like(&amy, &amy, &zed).unwrap();
        assert!(db.get_like(&amy, &amy, &zed).unwrap().is_some());
        assert!(db.get_like(&amy, &zed, &amy).unwrap().is_none());
    }

    #[test]
    fn test_only_actor_writes_and_only_ends_read() {
        let db = Database::open_in_memory().unwrap();
        let (amy, zed, cat) = (uid("amy"), uid("zed"), uid("cat"));

        assert!(db.put_like(&zed, &amy, &zed).unwrap_err().is_permission_denied());

        db.put_like(&amy, &amy, &zed).unwrap();
        assert!(db.get_like(&zed, &amy, &zed).unwrap().is_some());
        assert!(db.get_like(&cat, &amy, &zed).unwrap_err().is_permission_denied());
    }

    #[test]
    fn test_self_like_rejected() {
        let db = Database::open_in_memory().unwrap();
        let amy = uid("amy");
        assert!(db.put_like(&amy, &amy, &amy).is_err());
        assert!(db.likes_from(&amy, &amy).unwrap().is_empty());
    }
}
