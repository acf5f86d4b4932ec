//! Durable queue of mutations waiting for server confirmation.

use std::sync::Arc;

use serde_json::Value;

use crate::db::{LibSqlOperationRepository, OperationRepository};
use crate::models::{NewOperation, OperationId, OperationStatus, OperationType, PendingOperation};
use crate::notify::{Notice, Notifier};
use crate::util::iso_timestamp_now;
use crate::Result;

use super::Store;

/// Append-only log of CREATE/UPDATE/DELETE intents.
///
/// Entries move `pending -> syncing` and are then removed on success or
/// left `failed` with retry metadata. Storage errors are reported through
/// the notifier; only [`OperationQueue::try_list_pending`] returns them.
#[derive(Clone)]
pub struct OperationQueue {
    store: Store,
    notifier: Arc<dyn Notifier>,
}

impl OperationQueue {
    pub fn new(store: Store, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Append a PENDING entry stamped with the current time.
    ///
    /// Returns `None` when the entry could not be persisted.
    pub async fn enqueue(
        &self,
        op_type: OperationType,
        payload: Value,
        resource_path: &str,
    ) -> Option<OperationId> {
        self.enqueue_operation(NewOperation::new(op_type, payload, resource_path))
            .await
    }

    /// Append a prepared entry.
    pub async fn enqueue_operation(&self, operation: NewOperation) -> Option<OperationId> {
        let db = self.store.lock().await;
        let repo = LibSqlOperationRepository::new(db.connection());
        match repo.insert(&operation).await {
            Ok(id) => {
                tracing::debug!("Queued {} operation {id}", operation.op_type);
                Some(id)
            }
            Err(error) => {
                tracing::warn!("Failed to queue {} operation: {error}", operation.op_type);
                self.notifier.notify(&Notice::QueueWriteFailure);
                None
            }
        }
    }

    /// PENDING entries, oldest first.
    pub async fn list_pending(&self) -> Vec<PendingOperation> {
        self.list_with_status(OperationStatus::Pending).await
    }

    /// PENDING entries, oldest first, surfacing storage errors to the caller.
    pub async fn try_list_pending(&self) -> Result<Vec<PendingOperation>> {
        let db = self.store.lock().await;
        LibSqlOperationRepository::new(db.connection())
            .list_by_status(OperationStatus::Pending)
            .await
    }

    /// FAILED entries, oldest first.
    pub async fn list_failed(&self) -> Vec<PendingOperation> {
        self.list_with_status(OperationStatus::Failed).await
    }

    /// Every entry regardless of status, oldest first.
    pub async fn list_all(&self) -> Vec<PendingOperation> {
        let db = self.store.lock().await;
        let repo = LibSqlOperationRepository::new(db.connection());
        repo.list_all().await.unwrap_or_else(|error| {
            tracing::warn!("Failed to read queue: {error}");
            self.notifier.notify(&Notice::QueueReadFailure);
            Vec::new()
        })
    }

    /// Entry by id.
    pub async fn get(&self, id: OperationId) -> Option<PendingOperation> {
        let db = self.store.lock().await;
        let repo = LibSqlOperationRepository::new(db.connection());
        repo.get(id).await.unwrap_or_else(|error| {
            tracing::warn!("Failed to read operation {id}: {error}");
            self.notifier.notify(&Notice::QueueReadFailure);
            None
        })
    }

    /// Transition an entry's status, recording `error` when given.
    pub async fn set_status(&self, id: OperationId, status: OperationStatus, error: Option<&str>) {
        let db = self.store.lock().await;
        let repo = LibSqlOperationRepository::new(db.connection());
        if let Err(store_error) = repo.set_status(id, status, error).await {
            tracing::warn!("Failed to set operation {id} to {status}: {store_error}");
            self.notifier.notify(&Notice::QueueWriteFailure);
        }
    }

    /// Record a failed attempt: FAILED, error text, one more retry, `last_retry` now.
    pub async fn mark_failed(&self, id: OperationId, error: &str) {
        let db = self.store.lock().await;
        let repo = LibSqlOperationRepository::new(db.connection());
        if let Err(store_error) = repo.mark_failed(id, error, &iso_timestamp_now()).await {
            tracing::warn!("Failed to mark operation {id} as failed: {store_error}");
            self.notifier.notify(&Notice::QueueWriteFailure);
        }
    }

    /// Replace the payload of a queued entry.
    pub async fn update_payload(&self, id: OperationId, payload: &Value) {
        let db = self.store.lock().await;
        let repo = LibSqlOperationRepository::new(db.connection());
        if let Err(error) = repo.update_payload(id, payload).await {
            tracing::warn!("Failed to rewrite payload of operation {id}: {error}");
            self.notifier.notify(&Notice::QueueWriteFailure);
        }
    }

    /// Delete an entry. Only used once the server confirmed it.
    pub async fn remove(&self, id: OperationId) {
        let db = self.store.lock().await;
        let repo = LibSqlOperationRepository::new(db.connection());
        if let Err(error) = repo.remove(id).await {
            tracing::warn!("Failed to remove operation {id}: {error}");
            self.notifier.notify(&Notice::QueueWriteFailure);
        }
    }

    /// Move FAILED entries back to PENDING: one entry when `id` is given, all otherwise.
    ///
    /// Retry counters are kept. Returns the number of requeued entries.
    pub async fn retry_failed(&self, id: Option<OperationId>) -> usize {
        let db = self.store.lock().await;
        let repo = LibSqlOperationRepository::new(db.connection());
        match repo.requeue_failed(id).await {
            Ok(count) => {
                tracing::info!("Requeued {count} failed operations");
                count
            }
            Err(error) => {
                tracing::warn!("Failed to requeue failed operations: {error}");
                self.notifier.notify(&Notice::QueueWriteFailure);
                0
            }
        }
    }

    /// Return SYNCING entries to PENDING. Only valid while no drain is running.
    ///
    /// A drain that was cancelled or crashed leaves its current entry SYNCING,
    /// where neither `list_pending` nor `retry_failed` would reach it.
    pub async fn recover_interrupted(&self) -> usize {
        let db = self.store.lock().await;
        let repo = LibSqlOperationRepository::new(db.connection());
        match repo.requeue_syncing().await {
            Ok(count) => {
                if count > 0 {
                    tracing::info!("Recovered {count} operations from an interrupted sync");
                }
                count
            }
            Err(error) => {
                tracing::warn!("Failed to recover interrupted operations: {error}");
                self.notifier.notify(&Notice::QueueWriteFailure);
                0
            }
        }
    }

    async fn list_with_status(&self, status: OperationStatus) -> Vec<PendingOperation> {
        let db = self.store.lock().await;
        let repo = LibSqlOperationRepository::new(db.connection());
        repo.list_by_status(status).await.unwrap_or_else(|error| {
            tracing::warn!("Failed to read {status} operations: {error}");
            self.notifier.notify(&Notice::QueueReadFailure);
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::SilentNotifier;
    use crate::testing::{break_store, fixture};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test(flavor = "multi_thread")]
    async fn adds_and_retrieves_pending_operations() {
        let (_store, _cache, queue, _notifier) = fixture().await;

        let id = queue
            .enqueue(
                OperationType::Create,
                json!({"id": 1, "title": "Test Blog"}),
                "/blogs/",
            )
            .await
            .unwrap();

        let ops = queue.list_pending().await;
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op_type, OperationType::Create);
        assert_eq!(ops[0].payload["title"], json!("Test Blog"));
        assert_eq!(ops[0].status, OperationStatus::Pending);

        queue.remove(id).await;
        assert!(queue.list_pending().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_pending_is_fifo_by_timestamp() {
        let (_store, _cache, queue, _notifier) = fixture().await;

        for (label, timestamp) in [("t2", 2_000), ("t3", 3_000), ("t1", 1_000)] {
            queue
                .enqueue_operation(
                    NewOperation::new(OperationType::Update, json!({"id": 1, "title": label}), "blogs/")
                        .with_timestamp(timestamp),
                )
                .await
                .unwrap();
        }

        let labels: Vec<String> = queue
            .list_pending()
            .await
            .iter()
            .map(|op| op.payload["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(labels, vec!["t1", "t2", "t3"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn set_status_hides_entry_from_pending() {
        let (_store, _cache, queue, _notifier) = fixture().await;

        let id = queue
            .enqueue(OperationType::Delete, json!({"id": 1}), "blogs/")
            .await
            .unwrap();
        queue
            .set_status(id, OperationStatus::Failed, Some("server rejected"))
            .await;

        assert!(queue.list_pending().await.is_empty());
        let failed = queue.list_failed().await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error.as_deref(), Some("server rejected"));

        assert_eq!(queue.retry_failed(Some(id)).await, 1);
        assert_eq!(queue.list_pending().await.len(), 1);
        assert_eq!(queue.get(id).await.unwrap().status, OperationStatus::Pending);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn recover_interrupted_returns_syncing_entries_to_pending() {
        let (_store, _cache, queue, _notifier) = fixture().await;

        let id = queue
            .enqueue(OperationType::Update, json!({"id": 2, "title": "T"}), "blogs/")
            .await
            .unwrap();
        queue.set_status(id, OperationStatus::Syncing, None).await;
        assert!(queue.list_pending().await.is_empty());
        assert_eq!(queue.retry_failed(None).await, 0);

        assert_eq!(queue.recover_interrupted().await, 1);
        assert_eq!(queue.list_pending().await.len(), 1);
        assert_eq!(queue.recover_interrupted().await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mark_failed_records_retry_metadata() {
        let (_store, _cache, queue, _notifier) = fixture().await;

        let id = queue
            .enqueue(OperationType::Update, json!({"id": 4, "title": "T"}), "blogs/")
            .await
            .unwrap();
        queue.mark_failed(id, "HTTP 500").await;
        queue.mark_failed(id, "HTTP 502").await;

        let op = queue.get(id).await.unwrap();
        assert_eq!(op.status, OperationStatus::Failed);
        assert_eq!(op.retry_count, 2);
        assert_eq!(op.error.as_deref(), Some("HTTP 502"));
        assert!(op.last_retry.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn storage_failure_returns_sentinel_and_notifies() {
        let (store, _cache, queue, notifier) = fixture().await;
        break_store(&store).await;

        let id = queue
            .enqueue(OperationType::Create, json!({"title": "T"}), "blogs/")
            .await;
        assert_eq!(id, None);
        assert!(queue.list_pending().await.is_empty());
        assert_eq!(queue.retry_failed(None).await, 0);

        assert_eq!(
            notifier.messages(),
            vec![
                Notice::QueueWriteFailure.to_string(),
                Notice::QueueReadFailure.to_string(),
                Notice::QueueWriteFailure.to_string(),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn silent_notifier_still_yields_sentinel() {
        let store = Store::open_in_memory().await.unwrap();
        let queue = OperationQueue::new(store.clone(), Arc::new(SilentNotifier));
        break_store(&store).await;

        let id = queue
            .enqueue(OperationType::Delete, json!({"id": 1}), "blogs/")
            .await;
        assert_eq!(id, None);
        assert!(queue.list_all().await.is_empty());
        assert_eq!(queue.recover_interrupted().await, 0);
    }
}
