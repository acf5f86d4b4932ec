//! Drains the operation queue against the server.

mod retry;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use crate::models::{OperationStatus, OperationType, PendingOperation, Post};
use crate::notify::{Notice, Notifier};
use crate::services::{Cache, OperationQueue};
use crate::transport::{created_id, Transport};
use crate::util::iso_timestamp_now;
use crate::{Error, Result};

pub use retry::{BackoffConfig, RetryPolicy};

/// Result of one [`Synchronizer::sync_pending_operations`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another drain was in progress; nothing was done.
    AlreadyRunning,
    /// No PENDING entries.
    Idle,
    /// Every PENDING entry was attempted.
    Drained(DrainSummary),
    /// The queue could not be read.
    Aborted,
}

/// Per-drain counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub synced: usize,
    pub failed: usize,
}

/// Replays queued mutations against the server, one at a time, in FIFO order.
///
/// At most one drain runs per instance. Share it behind an `Arc`.
pub struct Synchronizer {
    cache: Cache,
    queue: OperationQueue,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
    running: AtomicBool,
}

impl Synchronizer {
    pub fn new(
        cache: Cache,
        queue: OperationQueue,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            cache,
            queue,
            transport,
            notifier,
            retry: RetryPolicy::default(),
            running: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Whether a drain is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Replay every PENDING entry against the server.
    ///
    /// Never fails: per-entry errors mark the entry FAILED and are reported
    /// through the notifier, queue read errors abort the drain.
    pub async fn sync_pending_operations(&self) -> SyncOutcome {
        let Some(_guard) = DrainGuard::acquire(&self.running) else {
            tracing::debug!("Sync already in progress, skipping");
            return SyncOutcome::AlreadyRunning;
        };

        // Holding the latch means no live drain owns a SYNCING entry.
        self.queue.recover_interrupted().await;
        self.requeue_due_failures().await;

        let pending = match self.queue.try_list_pending().await {
            Ok(pending) => pending,
            Err(error) => {
                tracing::error!("Failed to load pending operations: {error}");
                return SyncOutcome::Aborted;
            }
        };

        if pending.is_empty() {
            tracing::debug!("No pending operations to sync");
            return SyncOutcome::Idle;
        }

        tracing::info!("Syncing {} pending operations", pending.len());
        let mut summary = DrainSummary::default();
        let mut rebound = HashMap::new();

        for mut operation in pending {
            rebind_payload(&mut operation.payload, &rebound);
            self.queue
                .set_status(operation.id, OperationStatus::Syncing, None)
                .await;

            match self.replay(&operation, &mut rebound).await {
                Ok(()) => {
                    tracing::debug!("Synced {} operation {}", operation.op_type, operation.id);
                    self.queue.remove(operation.id).await;
                    summary.synced += 1;
                }
                Err(error) => {
                    let message = error.to_string();
                    tracing::warn!(
                        "Failed to sync {} operation {}: {message}",
                        operation.op_type,
                        operation.id
                    );
                    self.queue.mark_failed(operation.id, &message).await;
                    self.notifier.notify(&Notice::SyncFailure {
                        operation: operation.id,
                        op_type: operation.op_type,
                        error: message,
                    });
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            "Sync finished: {} synced, {} failed",
            summary.synced,
            summary.failed
        );
        SyncOutcome::Drained(summary)
    }

    /// Fetch the server's post list into the cache. Returns the number of cached posts.
    ///
    /// Accepts a bare array or an envelope under `data` or `results`.
    pub async fn pull(&self, resource_path: &str) -> Result<usize> {
        let response = self.transport.get(resource_path).await?;
        let items = list_items(&response).ok_or_else(|| {
            Error::Transport(format!("unexpected list response from {resource_path}"))
        })?;

        let posts = items
            .iter()
            .map(|item| {
                Post::from_payload(item).map(|post| Post {
                    is_synced: true,
                    ..post
                })
            })
            .collect::<serde_json::Result<Vec<_>>>()?;

        self.cache.cache_bulk(&posts).await;
        tracing::info!("Pulled {} posts from {resource_path}", posts.len());
        Ok(posts.len())
    }

    async fn requeue_due_failures(&self) {
        let RetryPolicy::Backoff(config) = &self.retry else {
            return;
        };

        let now = Utc::now();
        for operation in self.queue.list_failed().await {
            if config.is_due(&operation, now) {
                tracing::debug!(
                    "Requeueing operation {} after {} failed attempts",
                    operation.id,
                    operation.retry_count
                );
                self.queue.retry_failed(Some(operation.id)).await;
            }
        }
    }

    async fn replay(
        &self,
        operation: &PendingOperation,
        rebound: &mut HashMap<i64, i64>,
    ) -> Result<()> {
        match operation.op_type {
            OperationType::Create => {
                let response = self
                    .transport
                    .post(&operation.resource_path, &server_payload(&operation.payload))
                    .await?;
                self.confirm_create(operation, &response, rebound).await;
            }
            OperationType::Update => {
                let (id, path) = confirmed_target(operation)?;
                self.transport
                    .patch(&path, &server_payload(&operation.payload))
                    .await?;
                self.confirm_update(id, &operation.payload).await;
            }
            OperationType::Delete => {
                let (id, path) = confirmed_target(operation)?;
                self.transport.delete(&path).await?;
                self.cache.remove_cached(id).await;
            }
        }
        Ok(())
    }

    async fn confirm_create(
        &self,
        operation: &PendingOperation,
        response: &Value,
        rebound: &mut HashMap<i64, i64>,
    ) {
        let Some(server_id) = created_id(response) else {
            tracing::warn!(
                "Create response for operation {} carried no id; cache left unchanged",
                operation.id
            );
            return;
        };

        let provisional_id = operation.entity_id().filter(|id| *id < 0);
        let base = match provisional_id {
            Some(id) => self.cache.get_cached(id).await.unwrap_or_default(),
            None => Post::default(),
        };
        let post = match base.merged_with(&operation.payload) {
            Ok(post) => {
                let now = iso_timestamp_now();
                Post {
                    id: server_id,
                    is_synced: true,
                    created_at: now.clone(),
                    updated_at: now,
                    ..post
                }
            }
            Err(error) => {
                tracing::warn!("Could not build cached post {server_id}: {error}");
                self.notifier.notify(&Notice::CacheWriteFailure);
                return;
            }
        };

        match provisional_id {
            Some(old_id) => {
                self.cache.replace_cached(old_id, &post).await;
                rebound.insert(old_id, server_id);
                self.rebind_queued(operation, old_id, server_id).await;
            }
            None => self.cache.cache_bulk(&[post]).await,
        }
    }

    async fn confirm_update(&self, id: i64, payload: &Value) {
        let Some(cached) = self.cache.get_cached(id).await else {
            tracing::debug!("Post {id} not cached; nothing to refresh");
            return;
        };

        match cached.merged_with(payload) {
            Ok(post) => {
                let post = Post {
                    id,
                    is_synced: true,
                    updated_at: iso_timestamp_now(),
                    ..post
                };
                self.cache.cache_bulk(&[post]).await;
            }
            Err(error) => {
                tracing::warn!("Could not merge update into cached post {id}: {error}");
                self.notifier.notify(&Notice::CacheWriteFailure);
            }
        }
    }

    /// Point queued entries that still reference a placeholder id at the server id.
    async fn rebind_queued(&self, confirmed: &PendingOperation, old_id: i64, new_id: i64) {
        for mut queued in self.queue.list_all().await {
            if queued.id == confirmed.id || queued.entity_id() != Some(old_id) {
                continue;
            }
            queued.payload["id"] = json!(new_id);
            self.queue.update_payload(queued.id, &queued.payload).await;
            tracing::debug!("Rebound operation {} from post {old_id} to {new_id}", queued.id);
        }
    }
}

/// Clears the single-flight latch on every exit path.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Payload as the server should see it: no local-only flag, no placeholder id.
fn server_payload(payload: &Value) -> Value {
    let mut body = payload.clone();
    if let Some(fields) = body.as_object_mut() {
        fields.remove("isSynced");
        if fields
            .get("id")
            .and_then(Value::as_i64)
            .is_some_and(|id| id <= 0)
        {
            fields.remove("id");
        }
    }
    body
}

fn rebind_payload(payload: &mut Value, rebound: &HashMap<i64, i64>) {
    let Some(new_id) = payload
        .get("id")
        .and_then(Value::as_i64)
        .and_then(|id| rebound.get(&id))
        .copied()
    else {
        return;
    };
    payload["id"] = json!(new_id);
}

/// Entity id and URL of an UPDATE/DELETE whose post exists on the server.
fn confirmed_target(operation: &PendingOperation) -> Result<(i64, String)> {
    let id = operation.entity_id().ok_or_else(|| {
        Error::InvalidInput(format!("operation {} has no post id", operation.id))
    })?;
    if id <= 0 {
        return Err(Error::InvalidInput(format!(
            "post {id} has not been created on the server yet"
        )));
    }
    let path = operation.target_path().ok_or_else(|| {
        Error::InvalidInput(format!("operation {} has no target path", operation.id))
    })?;
    Ok((id, path))
}

fn list_items(response: &Value) -> Option<&Vec<Value>> {
    response
        .as_array()
        .or_else(|| response.get("data").and_then(Value::as_array))
        .or_else(|| response.get("results").and_then(Value::as_array))
}
