use crate::commands::common::{
    format_operation_lines, operation_to_list_item, AppContext, OperationListItem,
};
use crate::error::CliError;

pub async fn run_queue(failed_only: bool, as_json: bool, ctx: &AppContext) -> Result<(), CliError> {
    let operations = if failed_only {
        ctx.queue.list_failed().await
    } else {
        ctx.queue.list_all().await
    };

    if as_json {
        let json_items = operations
            .iter()
            .map(operation_to_list_item)
            .collect::<Vec<OperationListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if operations.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    for line in format_operation_lines(&operations) {
        println!("{line}");
    }
    Ok(())
}
