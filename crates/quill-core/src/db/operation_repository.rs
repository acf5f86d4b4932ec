//! Pending operation repository implementation

use crate::error::{Error, Result};
use crate::models::{NewOperation, OperationId, OperationStatus, PendingOperation};
use libsql::{params, Connection, Value};

/// Trait for operation queue storage (async)
#[allow(async_fn_in_trait)]
pub trait OperationRepository {
    /// Append an entry with PENDING status
    async fn insert(&self, operation: &NewOperation) -> Result<OperationId>;

    /// Get an entry by id
    async fn get(&self, id: OperationId) -> Result<Option<PendingOperation>>;

    /// Entries with the given status, oldest first
    async fn list_by_status(&self, status: OperationStatus) -> Result<Vec<PendingOperation>>;

    /// All entries, oldest first
    async fn list_all(&self) -> Result<Vec<PendingOperation>>;

    /// Set an entry's status, recording `error` when given
    async fn set_status(
        &self,
        id: OperationId,
        status: OperationStatus,
        error: Option<&str>,
    ) -> Result<()>;

    /// Mark an entry FAILED and bump its retry metadata
    async fn mark_failed(&self, id: OperationId, error: &str, retried_at: &str) -> Result<()>;

    /// Replace an entry's payload
    async fn update_payload(&self, id: OperationId, payload: &serde_json::Value) -> Result<()>;

    /// Delete an entry, returning whether it existed
    async fn remove(&self, id: OperationId) -> Result<bool>;

    /// Move FAILED entries (or one of them) back to PENDING
    async fn requeue_failed(&self, id: Option<OperationId>) -> Result<usize>;

    /// Move SYNCING entries left behind by an interrupted drain back to PENDING
    async fn requeue_syncing(&self) -> Result<usize>;

    /// Smallest post id referenced by any queued payload
    async fn min_entity_id(&self) -> Result<Option<i64>>;
}

/// libSQL implementation of `OperationRepository`
pub struct LibSqlOperationRepository<'a> {
    conn: &'a Connection,
}

const SELECT_COLUMNS: &str = "SELECT id, op_type, payload, resource_path, timestamp, status,
        error, retry_count, last_retry
    FROM pending_operations";

impl<'a> LibSqlOperationRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an operation from a database row
    fn parse_operation(row: &libsql::Row) -> Result<PendingOperation> {
        let op_type: String = row.get(1)?;
        let payload: String = row.get(2)?;
        let status: String = row.get(5)?;
        let retry_count: i64 = row.get(7)?;

        Ok(PendingOperation {
            id: OperationId::new(row.get(0)?),
            op_type: op_type.parse()?,
            payload: serde_json::from_str(&payload)?,
            resource_path: row.get(3)?,
            timestamp: row.get(4)?,
            status: status.parse()?,
            error: row.get(6)?,
            retry_count: u32::try_from(retry_count).unwrap_or_default(),
            last_retry: row.get(8)?,
        })
    }

    async fn collect(&self, mut rows: libsql::Rows) -> Result<Vec<PendingOperation>> {
        let mut operations = Vec::new();
        while let Some(row) = rows.next().await? {
            operations.push(Self::parse_operation(&row)?);
        }
        Ok(operations)
    }
}

fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

impl OperationRepository for LibSqlOperationRepository<'_> {
    async fn insert(&self, operation: &NewOperation) -> Result<OperationId> {
        let payload = serde_json::to_string(&operation.payload)?;
        self.conn
            .execute(
                "INSERT INTO pending_operations
                    (op_type, payload, resource_path, timestamp, status, retry_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0)",
                params![
                    operation.op_type.as_str(),
                    payload,
                    operation.resource_path.as_str(),
                    operation.timestamp,
                    OperationStatus::Pending.as_str()
                ],
            )
            .await?;

        Ok(OperationId::new(self.conn.last_insert_rowid()))
    }

    async fn get(&self, id: OperationId) -> Result<Option<PendingOperation>> {
        let rows = self
            .conn
            .query(&format!("{SELECT_COLUMNS} WHERE id = ?1"), params![id.get()])
            .await?;
        Ok(self.collect(rows).await?.into_iter().next())
    }

    async fn list_by_status(&self, status: OperationStatus) -> Result<Vec<PendingOperation>> {
        let rows = self
            .conn
            .query(
                &format!("{SELECT_COLUMNS} WHERE status = ?1 ORDER BY timestamp ASC, id ASC"),
                params![status.as_str()],
            )
            .await?;
        self.collect(rows).await
    }

    async fn list_all(&self) -> Result<Vec<PendingOperation>> {
        let rows = self
            .conn
            .query(&format!("{SELECT_COLUMNS} ORDER BY timestamp ASC, id ASC"), ())
            .await?;
        self.collect(rows).await
    }

    async fn set_status(
        &self,
        id: OperationId,
        status: OperationStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE pending_operations
                 SET status = ?1, error = COALESCE(?2, error)
                 WHERE id = ?3",
                params![status.as_str(), optional_text(error), id.get()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("operation {id}")));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: OperationId, error: &str, retried_at: &str) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE pending_operations
                 SET status = ?1, error = ?2, retry_count = retry_count + 1, last_retry = ?3
                 WHERE id = ?4",
                params![OperationStatus::Failed.as_str(), error, retried_at, id.get()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("operation {id}")));
        }
        Ok(())
    }

    async fn update_payload(&self, id: OperationId, payload: &serde_json::Value) -> Result<()> {
        let payload = serde_json::to_string(payload)?;
        self.conn
            .execute(
                "UPDATE pending_operations SET payload = ?1 WHERE id = ?2",
                params![payload, id.get()],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, id: OperationId) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM pending_operations WHERE id = ?1",
                params![id.get()],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn requeue_failed(&self, id: Option<OperationId>) -> Result<usize> {
        let rows = match id {
            Some(id) => {
                self.conn
                    .execute(
                        "UPDATE pending_operations SET status = ?1 WHERE status = ?2 AND id = ?3",
                        params![
                            OperationStatus::Pending.as_str(),
                            OperationStatus::Failed.as_str(),
                            id.get()
                        ],
                    )
                    .await?
            }
            None => {
                self.conn
                    .execute(
                        "UPDATE pending_operations SET status = ?1 WHERE status = ?2",
                        params![
                            OperationStatus::Pending.as_str(),
                            OperationStatus::Failed.as_str()
                        ],
                    )
                    .await?
            }
        };
        Ok(usize::try_from(rows).unwrap_or(usize::MAX))
    }

    async fn requeue_syncing(&self) -> Result<usize> {
        let rows = self
            .conn
            .execute(
                "UPDATE pending_operations SET status = ?1 WHERE status = ?2",
                params![
                    OperationStatus::Pending.as_str(),
                    OperationStatus::Syncing.as_str()
                ],
            )
            .await?;
        Ok(usize::try_from(rows).unwrap_or(usize::MAX))
    }

    async fn min_entity_id(&self) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT MIN(CAST(json_extract(payload, '$.id') AS INTEGER))
                 FROM pending_operations",
                (),
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<Option<i64>>(0)?),
            None => Ok(None),
        }
    }
}
