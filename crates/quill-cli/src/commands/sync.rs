use std::sync::Arc;

use quill_core::SyncOutcome;

use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_sync(ctx: &AppContext) -> Result<(), CliError> {
    let transport = Arc::new(ctx.http_transport()?);
    let synchronizer = ctx.synchronizer(transport);

    println!("{}", describe_outcome(synchronizer.sync_pending_operations().await));
    Ok(())
}

pub fn describe_outcome(outcome: SyncOutcome) -> String {
    match outcome {
        SyncOutcome::AlreadyRunning => "Sync already in progress".to_string(),
        SyncOutcome::Idle => "Nothing to sync".to_string(),
        SyncOutcome::Drained(summary) if summary.failed == 0 => {
            format!("Synced {} operations", summary.synced)
        }
        SyncOutcome::Drained(summary) => format!(
            "Synced {} operations, {} failed (see `quill queue --failed`)",
            summary.synced, summary.failed
        ),
        SyncOutcome::Aborted => "Sync aborted: the local queue could not be read".to_string(),
    }
}
