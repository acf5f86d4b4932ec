//! Shared store handle injected into the cache, queue, and synchronizer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::db::Database;
use crate::Result;

/// Clonable, thread-safe handle to one opened [`Database`].
///
/// Construct it once at startup and hand clones to every component.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Database>>,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the store at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        tracing::debug!("Opened local store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self::from_database(db))
    }

    /// Wrap an already opened database.
    pub fn from_database(db: Database) -> Self {
        let path = db.path().map(Path::to_path_buf);
        Self {
            db: Arc::new(Mutex::new(db)),
            path,
        }
    }

    /// Filesystem location of the store, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Exclusive access to the database for one unit of work.
    pub async fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().await
    }
}
