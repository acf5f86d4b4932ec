//! Database connection management

use crate::error::{Error, Result};
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::{Path, PathBuf};

use super::migrations;

/// Durable local store backed by a libSQL file
pub struct Database {
    // The connection is only valid while its database handle is alive.
    _db: LibSqlDatabase,
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open the store at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically. A store written by a newer schema
    /// version is rejected with [`Error::StoreUnavailable`].
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let path_str = path.to_string_lossy().to_string();
        let db = Builder::new_local(&path_str)
            .build()
            .await
            .map_err(|error| Error::StoreUnavailable(format!("{path_str}: {error}")))?;
        let conn = db
            .connect()
            .map_err(|error| Error::StoreUnavailable(format!("{path_str}: {error}")))?;

        let database = Self {
            _db: db,
            conn,
            path: Some(path),
        };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Open an in-memory store (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|error| Error::StoreUnavailable(error.to_string()))?;
        let conn = db
            .connect()
            .map_err(|error| Error::StoreUnavailable(error.to_string()))?;

        let database = Self {
            _db: db,
            conn,
            path: None,
        };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Configure `SQLite` for a single local writer
    async fn configure(&self) -> Result<()> {
        // journal_mode returns a row, which execute() may reject
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Filesystem location of the store, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
