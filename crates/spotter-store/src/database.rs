//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation. It also owns the server
//! clock and the change feed, so every committed write is stamped and
//! announced from a single place.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use directories::ProjectDirs;
use rusqlite::Connection;
use tokio::sync::broadcast;

use spotter_shared::constants::CHANGE_FEED_CAPACITY;

use crate::clock::ServerClock;
use crate::directory::{Change, Collection};
use crate::error::{Result, StoreError};
use crate::migrations;

/// SQLite-backed directory store.
///
/// Clones share the connection, the clock and the change feed.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<ServerClock>,
    changes: broadcast::Sender<Change>,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/spotter/spotter.db`
    /// - macOS:   `~/Library/Application Support/com.spotter.spotter/spotter.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\spotter\spotter\data\spotter.db`
    pub fn new() -> Result<Self> {
        Self::open_at(&default_path()?)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // Other processes may hold the write lock briefly.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Self::from_connection(conn)
    }

    /// Open a private in-memory database. Used by tests and demos.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: Arc::new(ServerClock::new()),
            changes,
        })
    }

    /// Lock and return the underlying `rusqlite::Connection`.
    ///
    /// Callers should prefer the typed helpers, but direct access is
    /// occasionally needed for ad-hoc queries in tests and tooling.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn()
            .ok()?
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    pub fn clock(&self) -> &ServerClock {
        &self.clock
    }

    /// Subscribe to the change feed.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    /// Run `call` on the blocking pool. Queries may wait on the file lock
    /// held by another process, which must not stall the runtime.
    pub(crate) async fn blocking<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || call(&db))
            .await
            .map_err(|e| StoreError::Unavailable(format!("store task failed: {e}")))?
    }

    /// Announce a committed write. Having no listener is not an error.
    pub(crate) fn publish(&self, collection: Collection, path: String) {
        tracing::trace!(?collection, %path, "change committed");
        let _ = self.changes.send(Change { collection, path });
    }
}

fn default_path() -> Result<PathBuf> {
    let project_dirs =
        ProjectDirs::from("com", "spotter", "spotter").ok_or(StoreError::NoDataDir)?;
    Ok(project_dirs.data_dir().join("spotter.db"))
}

/// Map a conversion failure in column `idx` to a rusqlite error.
pub(crate) fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}
