use crate::commands::common::{format_post_lines, post_to_list_item, AppContext, PostListItem};
use crate::error::CliError;

pub async fn run_list(as_json: bool, ctx: &AppContext) -> Result<(), CliError> {
    let posts = ctx.cache.list_cached().await;

    if as_json {
        let json_items = posts
            .iter()
            .map(post_to_list_item)
            .collect::<Vec<PostListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if posts.is_empty() {
        println!("No cached posts. Run `quill pull` to fetch them.");
    } else {
        for line in format_post_lines(&posts) {
            println!("{line}");
        }
    }

    Ok(())
}
