use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use quill_core::util::normalize_text_option;
use quill_core::{
    Cache, ClientConfig, HttpTransport, Notifier, OperationQueue, PendingOperation, Post, Store,
    Synchronizer, TracingNotifier, Transport,
};
use serde::Serialize;

use crate::error::CliError;

/// Everything a command needs: config plus cache and queue over one store.
pub struct AppContext {
    pub config: ClientConfig,
    pub cache: Cache,
    pub queue: OperationQueue,
    notifier: Arc<dyn Notifier>,
}

impl AppContext {
    pub async fn open(db_path: &Path, config: ClientConfig) -> Result<Self, CliError> {
        let store = Store::open_path(db_path).await?;
        let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
        Ok(Self {
            cache: Cache::new(store.clone(), notifier.clone()),
            queue: OperationQueue::new(store, notifier.clone()),
            config,
            notifier,
        })
    }

    pub fn http_transport(&self) -> Result<HttpTransport, CliError> {
        let base_url = self.config.require_api_base_url()?;
        Ok(HttpTransport::new(base_url, self.config.request_timeout())?)
    }

    pub fn synchronizer(&self, transport: Arc<dyn Transport>) -> Arc<Synchronizer> {
        Arc::new(
            Synchronizer::new(
                self.cache.clone(),
                self.queue.clone(),
                transport,
                self.notifier.clone(),
            )
            .with_retry_policy(self.config.retry.clone()),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct PostListItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub is_active: bool,
    pub is_synced: bool,
    pub created_at: String,
    pub updated_at: String,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct OperationListItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub op_type: String,
    pub status: String,
    pub post_id: Option<i64>,
    pub queued_at: String,
    pub retry_count: u32,
    pub last_retry: Option<String>,
    pub error: Option<String>,
}

pub fn format_post_lines(posts: &[Post]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    posts
        .iter()
        .map(|post| {
            let marker = if post.is_synced { ' ' } else { '*' };
            let title = preview(&post.title, 40);
            let relative_time = parse_iso_millis(&post.updated_at)
                .map_or_else(String::new, |updated| format_relative_time(updated, now_ms));
            let state = if post.is_active { "" } else { "  (inactive)" };
            format!("{marker}{:<6}  {title:<40}  {relative_time}{state}", post.id)
        })
        .collect()
}

pub fn post_to_list_item(post: &Post) -> PostListItem {
    let now_ms = Utc::now().timestamp_millis();
    PostListItem {
        id: post.id,
        title: post.title.clone(),
        description: post.description.clone(),
        is_active: post.is_active,
        is_synced: post.is_synced,
        created_at: post.created_at.clone(),
        updated_at: post.updated_at.clone(),
        relative_time: parse_iso_millis(&post.updated_at)
            .map_or_else(String::new, |updated| format_relative_time(updated, now_ms)),
    }
}

pub fn format_post_details(post: &Post) -> Vec<String> {
    vec![
        format!("id:          {}", post.id),
        format!("title:       {}", post.title),
        format!("active:      {}", post.is_active),
        format!("synced:      {}", post.is_synced),
        format!("created_at:  {}", post.created_at),
        format!("updated_at:  {}", post.updated_at),
        String::new(),
        post.description.clone(),
    ]
}

pub fn format_operation_lines(operations: &[PendingOperation]) -> Vec<String> {
    operations
        .iter()
        .map(|operation| {
            let post = operation
                .entity_id()
                .map_or_else(|| "-".to_string(), |id| id.to_string());
            let mut line = format!(
                "{:<5}  {:<6}  {:<9}  post={post:<6}  {}",
                operation.id.get(),
                operation.op_type.as_str(),
                operation.status.as_str(),
                format_timestamp(operation.timestamp)
            );
            if operation.retry_count > 0 {
                line.push_str(&format!("  retries={}", operation.retry_count));
            }
            if let Some(error) = &operation.error {
                line.push_str(&format!("  error={}", preview(error, 60)));
            }
            line
        })
        .collect()
}

pub fn operation_to_list_item(operation: &PendingOperation) -> OperationListItem {
    OperationListItem {
        id: operation.id.get(),
        op_type: operation.op_type.to_string(),
        status: operation.status.to_string(),
        post_id: operation.entity_id(),
        queued_at: format_timestamp(operation.timestamp),
        retry_count: operation.retry_count,
        last_retry: operation.last_retry.clone(),
        error: operation.error.clone(),
    }
}

/// Single-line preview capped at `max_chars`, with `...` when truncated.
pub fn preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn parse_iso_millis(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|date_time| date_time.timestamp_millis())
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn normalize_title(title: &str) -> Result<String, CliError> {
    normalize_text_option(Some(title.to_string())).ok_or(CliError::EmptyTitle)
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("QUILL_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quill")
        .join("quill.db")
}
