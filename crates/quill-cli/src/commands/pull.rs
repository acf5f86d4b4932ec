use std::sync::Arc;

use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_pull(ctx: &AppContext) -> Result<(), CliError> {
    let transport = Arc::new(ctx.http_transport()?);
    let synchronizer = ctx.synchronizer(transport);

    let count = synchronizer.pull(&ctx.config.resource_path).await?;
    println!("Cached {count} posts");
    Ok(())
}
