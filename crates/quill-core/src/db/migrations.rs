//! Database migrations
//!
//! Schema changes are additive: every version up to `CURRENT_VERSION` has a
//! migration step here.

use crate::error::{Error, Result};
use libsql::Connection;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version > CURRENT_VERSION {
        return Err(Error::StoreUnavailable(format!(
            "store schema version {version} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
pub async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Execute `statements` in one transaction, rolling back on the first failure
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated store to version {version}");
    Ok(())
}

/// Migration to version 1: entity cache and operation queue
async fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        1,
        &[
            // Schema version tracking
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            // Cached posts; inserted_seq preserves first-insertion order across upserts
            "CREATE TABLE IF NOT EXISTS entities (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                is_active INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL DEFAULT '',
                is_synced INTEGER NOT NULL DEFAULT 0,
                inserted_seq INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_entities_title ON entities(title)",
            "CREATE INDEX IF NOT EXISTS idx_entities_description ON entities(description)",
            "CREATE INDEX IF NOT EXISTS idx_entities_active ON entities(is_active)",
            "CREATE INDEX IF NOT EXISTS idx_entities_created ON entities(created_at)",
            "CREATE INDEX IF NOT EXISTS idx_entities_updated ON entities(updated_at)",
            "CREATE INDEX IF NOT EXISTS idx_entities_seq ON entities(inserted_seq)",
            // Pending mutation log
            "CREATE TABLE IF NOT EXISTS pending_operations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                op_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                resource_path TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                status TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_pending_ops_type ON pending_operations(op_type)",
            "CREATE INDEX IF NOT EXISTS idx_pending_ops_status ON pending_operations(status)",
            "CREATE INDEX IF NOT EXISTS idx_pending_ops_timestamp ON pending_operations(timestamp)",
            "INSERT INTO schema_version (version) VALUES (1)",
        ],
    )
    .await
}

/// Migration to version 2: retry metadata on queue entries
async fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        2,
        &[
            "ALTER TABLE pending_operations ADD COLUMN error TEXT",
            "ALTER TABLE pending_operations ADD COLUMN retry_count INTEGER NOT NULL DEFAULT 0",
            "ALTER TABLE pending_operations ADD COLUMN last_retry TEXT",
            "INSERT INTO schema_version (version) VALUES (2)",
        ],
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    async fn table_exists(conn: &Connection, name: &str) -> bool {
        let mut rows = conn
            .query(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master
                    WHERE type = 'table' AND name = ?
                )",
                [name],
            )
            .await
            .unwrap();

        rows.next()
            .await
            .unwrap()
            .is_some_and(|row| row.get::<i32>(0).unwrap() != 0)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
        assert!(table_exists(&conn, "entities").await);
        assert!(table_exists(&conn, "pending_operations").await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap(); // Should not fail

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_v1_store_upgrades_without_losing_queue() {
        let conn = setup().await;
        migrate_v1(&conn).await.unwrap();
        conn.execute(
            "INSERT INTO pending_operations (op_type, payload, resource_path, timestamp, status)
             VALUES ('DELETE', '{\"id\":1}', 'blogs/', 1, 'pending')",
            (),
        )
        .await
        .unwrap();

        run(&conn).await.unwrap();

        let mut rows = conn
            .query(
                "SELECT retry_count, last_retry FROM pending_operations",
                (),
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 0);
        assert_eq!(row.get::<Option<String>>(1).unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_newer_version_is_rejected() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (7)", ())
            .await
            .unwrap();

        let error = run(&conn).await.unwrap_err();
        assert!(matches!(error, Error::StoreUnavailable(_)));
    }
}
