//! Post cache repository implementation

use crate::error::Result;
use crate::models::Post;
use libsql::{params, Connection};

/// Trait for cached post storage operations (async)
#[allow(async_fn_in_trait)]
pub trait PostRepository {
    /// List all cached posts in insertion order
    async fn list(&self) -> Result<Vec<Post>>;

    /// Get a post by id
    async fn get(&self, id: i64) -> Result<Option<Post>>;

    /// Insert or overwrite a post by id
    async fn upsert(&self, post: &Post) -> Result<()>;

    /// Insert or overwrite many posts atomically
    async fn upsert_many(&self, posts: &[Post]) -> Result<()>;

    /// Delete a post, returning whether it existed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Move the post stored under `old_id` to `post.id`, keeping its position
    async fn replace_id(&self, old_id: i64, post: &Post) -> Result<()>;

    /// Smallest id in the cache
    async fn min_id(&self) -> Result<Option<i64>>;
}

/// libSQL implementation of `PostRepository`
pub struct LibSqlPostRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlPostRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a post from a database row
    fn parse_post(row: &libsql::Row) -> Result<Post> {
        Ok(Post {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            is_active: row.get::<i32>(3)? != 0,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            is_synced: row.get::<i32>(6)? != 0,
        })
    }

    async fn upsert_row(&self, post: &Post) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO entities
                    (id, title, description, is_active, created_at, updated_at, is_synced, inserted_seq)
                 VALUES
                    (?1, ?2, ?3, ?4, ?5, ?6, ?7,
                     (SELECT COALESCE(MAX(inserted_seq), 0) + 1 FROM entities))
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    description = excluded.description,
                    is_active = excluded.is_active,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at,
                    is_synced = excluded.is_synced",
                params![
                    post.id,
                    post.title.as_str(),
                    post.description.as_str(),
                    i32::from(post.is_active),
                    post.created_at.as_str(),
                    post.updated_at.as_str(),
                    i32::from(post.is_synced)
                ],
            )
            .await?;
        Ok(())
    }

    async fn in_transaction(&self, work: impl std::future::Future<Output = Result<()>>) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        if let Err(e) = work.await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e);
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
        Ok(())
    }
}

impl PostRepository for LibSqlPostRepository<'_> {
    async fn list(&self) -> Result<Vec<Post>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, description, is_active, created_at, updated_at, is_synced
                 FROM entities
                 ORDER BY inserted_seq ASC, id ASC",
                (),
            )
            .await?;

        let mut posts = Vec::new();
        while let Some(row) = rows.next().await? {
            posts.push(Self::parse_post(&row)?);
        }
        Ok(posts)
    }

    async fn get(&self, id: i64) -> Result<Option<Post>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, description, is_active, created_at, updated_at, is_synced
                 FROM entities
                 WHERE id = ?1",
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_post(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, post: &Post) -> Result<()> {
        self.upsert_row(post).await
    }

    async fn upsert_many(&self, posts: &[Post]) -> Result<()> {
        if posts.is_empty() {
            return Ok(());
        }

        self.in_transaction(async {
            for post in posts {
                self.upsert_row(post).await?;
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM entities WHERE id = ?1", params![id])
            .await?;
        Ok(rows > 0)
    }

    async fn replace_id(&self, old_id: i64, post: &Post) -> Result<()> {
        self.in_transaction(async {
            if old_id != post.id {
                self.conn
                    .execute("DELETE FROM entities WHERE id = ?1", params![post.id])
                    .await?;
            }

            let rows = self
                .conn
                .execute(
                    "UPDATE entities SET
                        id = ?1, title = ?2, description = ?3, is_active = ?4,
                        created_at = ?5, updated_at = ?6, is_synced = ?7
                     WHERE id = ?8",
                    params![
                        post.id,
                        post.title.as_str(),
                        post.description.as_str(),
                        i32::from(post.is_active),
                        post.created_at.as_str(),
                        post.updated_at.as_str(),
                        i32::from(post.is_synced),
                        old_id
                    ],
                )
                .await?;

            if rows == 0 {
                self.upsert_row(post).await?;
            }
            Ok(())
        })
        .await
    }

    async fn min_id(&self) -> Result<Option<i64>> {
        let mut rows = self.conn.query("SELECT MIN(id) FROM entities", ()).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<Option<i64>>(0)?),
            None => Ok(None),
        }
    }
}
