use quill_core::util::iso_timestamp_now;
use quill_core::OperationType;
use serde_json::{json, Map, Value};

use crate::commands::common::{normalize_title, AppContext};
use crate::error::CliError;

pub async fn run_edit(
    id: i64,
    title: Option<&str>,
    description: Option<&str>,
    active: Option<bool>,
    ctx: &AppContext,
) -> Result<(), CliError> {
    let cached = ctx
        .cache
        .get_cached(id)
        .await
        .ok_or(CliError::PostNotFound(id))?;

    let payload = build_update_payload(id, title, description, active)?;
    let mut updated = cached.merged_with(&payload)?;
    updated.is_synced = false;
    updated.updated_at = iso_timestamp_now();

    ctx.cache.cache_bulk(&[updated]).await;
    ctx.queue
        .enqueue(OperationType::Update, payload, &ctx.config.resource_path)
        .await
        .ok_or(CliError::StoreUnavailable)?;

    println!("{id}");
    Ok(())
}

/// UPDATE payload carrying the post id and only the fields being changed.
pub fn build_update_payload(
    id: i64,
    title: Option<&str>,
    description: Option<&str>,
    active: Option<bool>,
) -> Result<Value, CliError> {
    let mut fields = Map::new();
    if let Some(title) = title {
        fields.insert("title".to_string(), json!(normalize_title(title)?));
    }
    if let Some(description) = description {
        fields.insert("description".to_string(), json!(description.trim()));
    }
    if let Some(active) = active {
        fields.insert("is_active".to_string(), json!(active));
    }

    if fields.is_empty() {
        return Err(CliError::NoChanges);
    }
    fields.insert("id".to_string(), json!(id));
    Ok(Value::Object(fields))
}
