use quill_core::OperationId;

use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_retry(id: Option<i64>, ctx: &AppContext) -> Result<(), CliError> {
    let count = ctx.queue.retry_failed(id.map(OperationId::new)).await;

    if let (Some(id), 0) = (id, count) {
        return Err(CliError::OperationNotFound(id));
    }

    println!("Requeued {count} operations");
    Ok(())
}
