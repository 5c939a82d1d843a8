//! CRUD operations for `users/{id}` profile documents.

use rusqlite::{params, OptionalExtension};

use spotter_shared::constants::USERS_COLLECTION;
use spotter_shared::protocol::{ProfileFields, UserProfile};
use spotter_shared::UserId;

use crate::clock::from_micros;
use crate::database::{conversion_error, Database};
use crate::directory::{Collection, WriteMode};
use crate::error::{Result, StoreError};
use crate::policy;

const SELECT_USER: &str = "SELECT id, name, gym_name, workout_type, timing, email, photo_url,
        created_at, updated_at
 FROM users";

impl Database {
    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Write the caller's own profile document.
    ///
    /// [`WriteMode::Overwrite`] replaces everything and stamps `createdAt`;
    /// [`WriteMode::Merge`] keeps `createdAt` and stamps `updatedAt`.
    pub fn set_user(
        &self,
        caller: &UserId,
        id: &UserId,
        fields: &ProfileFields,
        mode: WriteMode,
    ) -> Result<UserProfile> {
        policy::ensure_owner(caller, id, "the profile")?;

        let now = self.clock().now().timestamp_micros();
        {
            let conn = self.conn()?;
            match mode {
                WriteMode::Overwrite => {
                    conn.execute(
                        "INSERT OR REPLACE INTO users
                             (id, name, gym_name, workout_type, timing, email, photo_url,
                              created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)",
                        params![
                            id.as_str(),
                            fields.name,
                            fields.gym_name,
                            fields.workout_type,
                            fields.timing,
                            fields.email,
                            fields.photo_url,
                            now,
                        ],
                    )?;
                }
                WriteMode::Merge => {
                    conn.execute(
                        "INSERT INTO users
                             (id, name, gym_name, workout_type, timing, email, photo_url,
                              created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)
                         ON CONFLICT(id) DO UPDATE SET
                             name         = excluded.name,
                             gym_name     = excluded.gym_name,
                             workout_type = excluded.workout_type,
                             timing       = excluded.timing,
                             email        = excluded.email,
                             photo_url    = excluded.photo_url,
                             updated_at   = excluded.updated_at",
                        params![
                            id.as_str(),
                            fields.name,
                            fields.gym_name,
                            fields.workout_type,
                            fields.timing,
                            fields.email,
                            fields.photo_url,
                            now,
                        ],
                    )?;
                }
            }
        }

        tracing::debug!(user = %id, ?mode, "profile written");
        self.publish(Collection::Users, format!("{USERS_COLLECTION}/{id}"));

        self.get_user(id)?.ok_or(StoreError::NotFound)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single profile. Profiles are readable by every signed-in user.
    pub fn get_user(&self, id: &UserId) -> Result<Option<UserProfile>> {
        let conn = self.conn()?;
        let profile = conn
            .query_row(
                &format!("{SELECT_USER} WHERE id = ?1"),
                params![id.as_str()],
                row_to_user,
            )
            .optional()?;
        Ok(profile)
    }

    /// List all profiles ordered by id.
    pub fn list_users(&self) -> Result<Vec<UserProfile>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{SELECT_USER} ORDER BY id ASC"))?;
        let rows = stmt.query_map([], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserProfile> {
    let id_str: String = row.get(0)?;
    let id = UserId::parse(id_str).map_err(|e| conversion_error(0, e))?;

    let created_at: Option<i64> = row.get(7)?;
    let updated_at: Option<i64> = row.get(8)?;

    Ok(UserProfile {
        id,
        fields: ProfileFields {
            name: row.get(1)?,
            gym_name: row.get(2)?,
            workout_type: row.get(3)?,
            timing: row.get(4)?,
            email: row.get(5)?,
            photo_url: row.get(6)?,
        },
        created_at: created_at.map(from_micros),
        updated_at: updated_at.map(from_micros),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    fn fields(name: &str) -> ProfileFields {
        ProfileFields {
            name: name.into(),
            gym_name: "Iron Works".into(),
            workout_type: "Cardio".into(),
            timing: "Evening".into(),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            photo_url: None,
        }
    }

    #[test]
    fn test_overwrite_then_merge_keeps_created_at() {
        let db = Database::open_in_memory().unwrap();
        let amy = uid("amy");

        let created = db
            .set_user(&amy, &amy, &fields("Amy"), WriteMode::Overwrite)
            .unwrap();
        assert!(created.created_at.is_some());
        assert!(created.updated_at.is_none());

        let mut edit = fields("Amy B");
        edit.photo_url = Some("data:image/jpeg;base64,AAAA".into());
        let updated = db.set_user(&amy, &amy, &edit, WriteMode::Merge).unwrap();

        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at.is_some());
        assert_eq!(updated.fields.name, "Amy B");
        assert_eq!(updated.fields.photo_url.as_deref(), Some("data:image/jpeg;base64,AAAA"));
    }

    #[test]
    fn test_merge_on_missing_document_creates_it() {
        let db = Database::open_in_memory().unwrap();
        let amy = uid("amy");
        let profile = db.set_user(&amy, &amy, &fields("Amy"), WriteMode::Merge).unwrap();
        assert!(profile.created_at.is_none());
        assert!(profile.updated_at.is_some());
    }

    #[test]
    fn test_cannot_write_someone_elses_profile() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .set_user(&uid("amy"), &uid("zed"), &fields("Zed"), WriteMode::Overwrite)
            .unwrap_err();
        assert!(err.is_permission_denied());
        assert!(db.get_user(&uid("zed")).unwrap().is_none());
    }

    #[test]
    fn test_list_users_is_ordered() {
        let db = Database::open_in_memory().unwrap();
        for name in ["zed", "amy", "bob"] {
            let id = uid(name);
            db.set_user(&id, &id, &fields(name), WriteMode::Overwrite)
                .unwrap();
        }
        let ids: Vec<String> = db
            .list_users()
            .unwrap()
            .into_iter()
            .map(|u| u.id.to_string())
            .collect();
        assert_eq!(ids, ["amy", "bob", "zed"]);
    }

    #[test]
    fn test_undecodable_row_is_reported_as_corrupt() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .unwrap()
            .execute(
                "INSERT INTO users (id, name, gym_name, workout_type, timing)
                 VALUES ('has space', 'X', 'G', 'W', 'T')",
                [],
            )
            .unwrap();

        let err = db.list_users().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { column: 0, .. }), "{err}");
    }
}
