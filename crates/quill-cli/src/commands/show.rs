use crate::commands::common::{format_post_details, AppContext};
use crate::error::CliError;

pub async fn run_show(id: i64, ctx: &AppContext) -> Result<(), CliError> {
    let post = ctx
        .cache
        .get_cached(id)
        .await
        .ok_or(CliError::PostNotFound(id))?;

    for line in format_post_details(&post) {
        println!("{line}");
    }
    Ok(())
}
