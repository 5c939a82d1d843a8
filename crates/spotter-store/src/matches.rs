//! Match documents: `matches/{id}`.
//!
//! Two ways to create one: [`Database::add_match`] under a fresh auto id,
//! which lets concurrent creators produce duplicates, and
//! [`Database::create_match_if_absent`] under the deterministic
//! [`MatchKey`], where the primary key admits exactly one winner.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use spotter_shared::constants::MATCHES_COLLECTION;
use spotter_shared::protocol::MatchRecord;
use spotter_shared::{MatchKey, UserId, UserPair};

use crate::clock::from_micros;
use crate::database::{conversion_error, Database};
use crate::directory::{Collection, CreateOutcome};
use crate::error::{Result, StoreError};
use crate::policy;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn add_match(&self, caller: &UserId, users: &UserPair) -> Result<MatchRecord> {
        policy::ensure_participant(caller, users, "the match")?;

        let record = MatchRecord {
            id: Uuid::new_v4().simple().to_string(),
            users: users.clone(),
            created_at: self.clock().now(),
        };
        self.insert_match(&record, false)?;

        tracing::info!(id = %record.id, %users, "match document added");
        self.publish(Collection::Matches, format!("{MATCHES_COLLECTION}/{}", record.id));
        Ok(record)
    }

    pub fn create_match_if_absent(
        &self,
        caller: &UserId,
        key: &MatchKey,
        users: &UserPair,
    ) -> Result<CreateOutcome<MatchRecord>> {
        policy::ensure_participant(caller, users, "the match")?;
        if &MatchKey::for_pair(users) != key {
            return Err(StoreError::Invalid(format!(
                "match key {key} does not belong to {users}"
            )));
        }

        let record = MatchRecord {
            id: key.to_string(),
            users: users.clone(),
            created_at: self.clock().now(),
        };

        if self.insert_match(&record, true)? {
            tracing::info!(id = %record.id, "match document created");
            self.publish(Collection::Matches, format!("{MATCHES_COLLECTION}/{key}"));
            Ok(CreateOutcome::Created(record))
        } else {
            let existing = self.get_match(key.as_str())?.ok_or(StoreError::NotFound)?;
            tracing::debug!(id = %existing.id, "match document already present");
            Ok(CreateOutcome::Existing(existing))
        }
    }

    /// Returns `false` when `or_ignore` is set and the id already exists.
    fn insert_match(&self, record: &MatchRecord, or_ignore: bool) -> Result<bool> {
        let sql = if or_ignore {
            "INSERT OR IGNORE INTO matches (id, user_low, user_high, created_at)
             VALUES (?1, ?2, ?3, ?4)"
        } else {
            "INSERT INTO matches (id, user_low, user_high, created_at)
             VALUES (?1, ?2, ?3, ?4)"
        };
        let affected = self.conn()?.execute(
            sql,
            params![
                record.id,
                record.users.low().as_str(),
                record.users.high().as_str(),
                record.created_at.timestamp_micros(),
            ],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_match(&self, id: &str) -> Result<Option<MatchRecord>> {
        let record = self
            .conn()?
            .query_row(
                "SELECT id, user_low, user_high, created_at FROM matches WHERE id = ?1",
                params![id],
                row_to_match,
            )
            .optional()?;
        Ok(record)
    }

    /// Matches listing `user`, ordered by creation time then id.
    pub fn matches_for(&self, caller: &UserId, user: &UserId) -> Result<Vec<MatchRecord>> {
        policy::ensure_owner(caller, user, "the matches")?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_low, user_high, created_at
             FROM matches
             WHERE user_low = ?1 OR user_high = ?1
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![user.as_str()], row_to_match)?;

        let mut matches = Vec::new();
        for row in rows {
            matches.push(row?);
        }
        Ok(matches)
    }
}

fn row_to_match(row: &rusqlite::Row<'_>) -> rusqlite::Result<MatchRecord> {
    let id: String = row.get(0)?;
    let low: String = row.get(1)?;
    let high: String = row.get(2)?;
    let created: i64 = row.get(3)?;

    let low = UserId::parse(low).map_err(|e| conversion_error(1, e))?;
    let high = UserId::parse(high).map_err(|e| conversion_error(2, e))?;
    let users = UserPair::new(low, high).map_err(|e| conversion_error(1, e))?;

    Ok(MatchRecord {
        id,
        users,
        created_at: from_micros(created),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    fn pair(a: &str, b: &str) -> UserPair {
        UserPair::new(uid(a), uid(b)).unwrap()
    }

    #[test]
    fn test_auto_id_matches_can_duplicate() {
        let db = Database::open_in_memory().unwrap();
        let amy = uid("amy");
        db.add_match(&amy, &pair("amy", "zed")).unwrap();
        db.add_match(&amy, &pair("zed", "amy")).unwrap();
        assert_eq!(db.matches_for(&amy, &amy).unwrap().len(), 2);
    }

    #[test]
    fn test_keyed_create_has_single_winner() {
        let db = Database::open_in_memory().unwrap();
        let users = pair("amy", "zed");
        let key = MatchKey::for_pair(&users);

        let first = db.create_match_if_absent(&uid("amy"), &key, &users).unwrap();
        let second = db.create_match_if_absent(&uid("zed"), &key, &users).unwrap();

        assert!(first.was_created());
        assert!(!second.was_created());
        assert_eq!(first.into_inner(), second.into_inner());
        assert_eq!(db.matches_for(&uid("zed"), &uid("zed")).unwrap().len(), 1);
    }

    #[test]
    fn test_keyed_create_rejects_foreign_key() {
        let db = Database::open_in_memory().unwrap();
        let users = pair("amy", "zed");
        let other = MatchKey::for_pair(&pair("amy", "bob"));
        assert!(matches!(
            db.create_match_if_absent(&uid("amy"), &other, &users),
            Err(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn test_only_participants_create_and_only_self_queries() {
        let db = Database::open_in_memory().unwrap();
        let cat = uid("cat");
        assert!(db
            .add_match(&cat, &pair("amy", "zed"))
            .unwrap_err()
            .is_permission_denied());
        assert!(db
            .matches_for(&cat, &uid("amy"))
            .unwrap_err()
            .is_permission_denied());
    }

    #[test]
    fn test_matches_for_filters_by_participant() {
        let db = Database::open_in_memory().unwrap();
        db.add_match(&uid("amy"), &pair("amy", "zed")).unwrap();
        db.add_match(&uid("bob"), &pair("bob", "cat")).unwrap();

        let amy = uid("amy");
        let found = db.matches_for(&amy, &amy).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].users.contains(&uid("zed")));
    }
}
