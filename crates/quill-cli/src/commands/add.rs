use quill_core::{OperationType, Post};

use crate::commands::common::{normalize_title, AppContext};
use crate::error::CliError;

/// Caches the new post under a provisional id and queues its creation.
pub async fn run_add(
    title: &str,
    description: &str,
    inactive: bool,
    ctx: &AppContext,
) -> Result<(), CliError> {
    let title = normalize_title(title)?;
    let id = ctx
        .cache
        .next_provisional_id()
        .await
        .ok_or(CliError::StoreUnavailable)?;

    let post = Post::new(id, title, description.trim(), !inactive);
    ctx.cache.cache_bulk(&[post.clone()]).await;
    ctx.queue
        .enqueue(
            OperationType::Create,
            post.to_payload()?,
            &ctx.config.resource_path,
        )
        .await
        .ok_or(CliError::StoreUnavailable)?;

    println!("{id}");
    Ok(())
}
