//! Cache accessor over the cached posts table.

use std::sync::Arc;

use crate::db::{
    LibSqlOperationRepository, LibSqlPostRepository, OperationRepository, PostRepository,
};
use crate::models::Post;
use crate::notify::{Notice, Notifier};
use crate::Result;

use super::Store;

/// Read/write access to cached posts.
///
/// No method returns an error: reads degrade to empty results and writes
/// report a [`Notice`] instead, so callers must not assume a write landed.
#[derive(Clone)]
pub struct Cache {
    store: Store,
    notifier: Arc<dyn Notifier>,
}

impl Cache {
    pub fn new(store: Store, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// All cached posts in insertion order.
    pub async fn list_cached(&self) -> Vec<Post> {
        let db = self.store.lock().await;
        let repo = LibSqlPostRepository::new(db.connection());
        match repo.list().await {
            Ok(posts) => posts,
            Err(error) => {
                tracing::warn!("Cache read failed: {error}");
                self.notifier.notify(&Notice::CacheReadFailure);
                Vec::new()
            }
        }
    }

    /// Cached post by id.
    pub async fn get_cached(&self, id: i64) -> Option<Post> {
        let db = self.store.lock().await;
        let repo = LibSqlPostRepository::new(db.connection());
        match repo.get(id).await {
            Ok(post) => post,
            Err(error) => {
                tracing::warn!("Cache read of post {id} failed: {error}");
                self.notifier.notify(&Notice::CacheReadFailure);
                None
            }
        }
    }

    /// Insert or overwrite posts by id. Repeating a call leaves the same state.
    pub async fn cache_bulk(&self, posts: &[Post]) {
        let db = self.store.lock().await;
        let repo = LibSqlPostRepository::new(db.connection());
        match repo.upsert_many(posts).await {
            Ok(()) => tracing::debug!("Cached {} posts", posts.len()),
            Err(error) => {
                tracing::warn!("Cache write of {} posts failed: {error}", posts.len());
                self.notifier.notify(&Notice::CacheWriteFailure);
            }
        }
    }

    /// Drop a post from the cache. Returns whether it was present.
    pub async fn remove_cached(&self, id: i64) -> bool {
        let db = self.store.lock().await;
        let repo = LibSqlPostRepository::new(db.connection());
        match repo.delete(id).await {
            Ok(removed) => removed,
            Err(error) => {
                tracing::warn!("Cache delete of post {id} failed: {error}");
                self.notifier.notify(&Notice::CacheWriteFailure);
                false
            }
        }
    }

    /// Store `post` in place of the row cached under `old_id`, keeping its position.
    pub async fn replace_cached(&self, old_id: i64, post: &Post) {
        let db = self.store.lock().await;
        let repo = LibSqlPostRepository::new(db.connection());
        if let Err(error) = repo.replace_id(old_id, post).await {
            tracing::warn!("Cache rebind of post {old_id} -> {} failed: {error}", post.id);
            self.notifier.notify(&Notice::CacheWriteFailure);
        }
    }

    /// Next unused placeholder id for a post created while offline.
    ///
    /// Placeholders are negative so they never collide with server ids. Ids
    /// still referenced by queued operations count as used even after the
    /// draft left the cache.
    pub async fn next_provisional_id(&self) -> Option<i64> {
        let db = self.store.lock().await;
        let posts = LibSqlPostRepository::new(db.connection());
        let operations = LibSqlOperationRepository::new(db.connection());
        match lowest_used_id(&posts, &operations).await {
            Ok(lowest) => Some(lowest.unwrap_or(0).min(0) - 1),
            Err(error) => {
                tracing::warn!("Could not allocate a provisional id: {error}");
                self.notifier.notify(&Notice::CacheReadFailure);
                None
            }
        }
    }
}

async fn lowest_used_id(
    posts: &LibSqlPostRepository<'_>,
    operations: &LibSqlOperationRepository<'_>,
) -> Result<Option<i64>> {
    let cached = posts.min_id().await?;
    let queued = operations.min_entity_id().await?;
    Ok(cached.into_iter().chain(queued).min())
}
