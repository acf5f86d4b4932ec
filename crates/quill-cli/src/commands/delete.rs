use quill_core::OperationType;
use serde_json::json;

use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_delete(id: i64, ctx: &AppContext) -> Result<(), CliError> {
    if !ctx.cache.remove_cached(id).await {
        tracing::debug!("Post {id} was not cached; queueing delete anyway");
    }

    ctx.queue
        .enqueue(
            OperationType::Delete,
            json!({ "id": id }),
            &ctx.config.resource_path,
        )
        .await
        .ok_or(CliError::StoreUnavailable)?;

    println!("{id}");
    Ok(())
}
