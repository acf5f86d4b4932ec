use std::path::PathBuf;

use pretty_assertions::assert_eq;
use quill_core::{
    ClientConfig, DrainSummary, OperationId, OperationStatus, OperationType, PendingOperation,
    Post, SyncOutcome,
};
use serde_json::json;
use tempfile::TempDir;

use crate::cli::CompletionShell;
use crate::commands::add::run_add;
use crate::commands::common::{
    format_operation_lines, format_relative_time, format_timestamp, normalize_title,
    parse_iso_millis, preview, resolve_db_path, AppContext,
};
use crate::commands::completions::render_completions;
use crate::commands::delete::run_delete;
use crate::commands::edit::{build_update_payload, run_edit};
use crate::commands::retry::run_retry;
use crate::commands::sync::{describe_outcome, run_sync};
use crate::error::CliError;

async fn open_test_context() -> (TempDir, AppContext) {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = AppContext::open(&tmp.path().join("quill.db"), ClientConfig::default())
        .await
        .unwrap();
    (tmp, ctx)
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn preview_truncates_with_ellipsis() {
    assert_eq!(
        preview("This is a very long title that should be shortened", 20),
        "This is a very lo..."
    );
    assert_eq!(preview("  short \n title ", 20), "short title");
}

#[test]
fn format_timestamp_returns_utc_label() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn parse_iso_millis_reads_post_timestamps() {
    assert_eq!(parse_iso_millis("1970-01-01T00:00:01.500Z"), Some(1_500));
    assert_eq!(parse_iso_millis("yesterday"), None);
}

#[test]
fn normalize_title_rejects_blank() {
    assert_eq!(normalize_title("  Hello  ").unwrap(), "Hello");
    assert!(matches!(normalize_title(" \t "), Err(CliError::EmptyTitle)));
}

#[test]
fn build_update_payload_carries_only_changed_fields() {
    let payload = build_update_payload(7, Some(" New "), None, Some(false)).unwrap();
    assert_eq!(payload, json!({"id": 7, "title": "New", "is_active": false}));

    assert!(matches!(
        build_update_payload(7, None, None, None),
        Err(CliError::NoChanges)
    ));
}

#[test]
fn format_operation_lines_include_key_fields() {
    let operation = PendingOperation {
        id: OperationId::new(3),
        op_type: OperationType::Update,
        payload: json!({"id": 12, "title": "T"}),
        resource_path: "blogs/".to_string(),
        timestamp: 0,
        status: OperationStatus::Failed,
        error: Some("Transport error: HTTP 500".to_string()),
        retry_count: 2,
        last_retry: None,
    };

    let lines = format_operation_lines(&[operation]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("3      UPDATE  failed"));
    assert!(lines[0].contains("post=12"));
    assert!(lines[0].contains("retries=2"));
    assert!(lines[0].contains("error=Transport error: HTTP 500"));
}

#[test]
fn describe_outcome_mentions_failures() {
    assert_eq!(describe_outcome(SyncOutcome::Idle), "Nothing to sync");
    assert_eq!(
        describe_outcome(SyncOutcome::Drained(DrainSummary { synced: 2, failed: 0 })),
        "Synced 2 operations"
    );
    assert!(
        describe_outcome(SyncOutcome::Drained(DrainSummary { synced: 1, failed: 1 }))
            .contains("1 failed")
    );
}

#[test]
fn resolve_db_path_prefers_explicit_path() {
    let explicit = PathBuf::from("/tmp/explicit-quill.db");
    assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
}

#[test]
fn bash_completions_name_the_binary() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("_quill()"));
    assert!(script.contains("complete -F _quill"));
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn run_add_caches_provisional_post_and_queues_create() {
    let (_tmp, ctx) = open_test_context().await;

    run_add("First", "Body", false, &ctx).await.unwrap();
    run_add("Second", "", true, &ctx).await.unwrap();

    let posts = ctx.cache.list_cached().await;
    assert_eq!(posts.iter().map(|post| post.id).collect::<Vec<_>>(), vec![-1, -2]);
    assert!(posts.iter().all(|post| !post.is_synced));
    assert!(!posts[1].is_active);

    let queued = ctx.queue.list_pending().await;
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[0].op_type, OperationType::Create);
    assert_eq!(queued[0].payload["title"], json!("First"));
    assert_eq!(queued[0].resource_path, "blogs/");
    assert!(queued[0].payload.get("isSynced").is_none());
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn run_edit_updates_cache_and_queues_partial_update() {
    let (_tmp, ctx) = open_test_context().await;
    let post = Post {
        is_synced: true,
        ..Post::new(5, "Old", "Keep", true)
    };
    ctx.cache.cache_bulk(&[post]).await;

    run_edit(5, Some("New"), None, None, &ctx).await.unwrap();

    let cached = ctx.cache.get_cached(5).await.unwrap();
    assert_eq!(cached.title, "New");
    assert_eq!(cached.description, "Keep");
    assert!(!cached.is_synced);

    let queued = ctx.queue.list_pending().await;
    assert_eq!(queued[0].op_type, OperationType::Update);
    assert_eq!(queued[0].payload, json!({"id": 5, "title": "New"}));
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn run_edit_rejects_unknown_post() {
    let (_tmp, ctx) = open_test_context().await;

    let error = run_edit(99, Some("T"), None, None, &ctx).await.unwrap_err();
    assert!(matches!(error, CliError::PostNotFound(99)));
    assert!(ctx.queue.list_all().await.is_empty());
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn run_delete_removes_post_and_queues_delete() {
    let (_tmp, ctx) = open_test_context().await;
    ctx.cache.cache_bulk(&[Post::new(8, "Gone", "", true)]).await;

    run_delete(8, &ctx).await.unwrap();

    assert!(ctx.cache.get_cached(8).await.is_none());
    let queued = ctx.queue.list_pending().await;
    assert_eq!(queued[0].op_type, OperationType::Delete);
    assert_eq!(queued[0].target_path().as_deref(), Some("blogs/8/"));
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn run_retry_rejects_unknown_operation() {
    let (_tmp, ctx) = open_test_context().await;

    let error = run_retry(Some(42), &ctx).await.unwrap_err();
    assert!(matches!(error, CliError::OperationNotFound(42)));
    run_retry(None, &ctx).await.unwrap();
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn run_sync_requires_api_base_url() {
    let (_tmp, ctx) = open_test_context().await;

    let error = run_sync(&ctx).await.unwrap_err();
    assert!(matches!(
        error,
        CliError::Core(quill_core::Error::Config(_))
    ));
}
