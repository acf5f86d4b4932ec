//! Quill CLI - edit posts offline and sync them later
//!
//! Every mutation lands in the local cache immediately and is queued for the
//! server; `quill sync` or `quill watch` replays the queue.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};
use quill_core::ClientConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::{resolve_db_path, AppContext};
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::pull::run_pull;
use crate::commands::queue::run_queue;
use crate::commands::retry::run_retry;
use crate::commands::show::run_show;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quill=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help().map_err(CliError::Io)?;
        println!();
        return Ok(());
    };

    if let Commands::Completions { shell, output } = &command {
        return run_completions(*shell, output.as_deref());
    }

    let config = ClientConfig::from_env()?;
    let db_path = resolve_db_path(cli.db_path);
    let ctx = AppContext::open(&db_path, config).await?;

    match command {
        Commands::List { json } => run_list(json, &ctx).await?,
        Commands::Show { id } => run_show(id, &ctx).await?,
        Commands::Add {
            title,
            description,
            inactive,
        } => run_add(&title, &description, inactive, &ctx).await?,
        Commands::Edit {
            id,
            title,
            description,
            active,
        } => {
            run_edit(id, title.as_deref(), description.as_deref(), active, &ctx).await?;
        }
        Commands::Delete { id } => run_delete(id, &ctx).await?,
        Commands::Pull => run_pull(&ctx).await?,
        Commands::Queue { failed, json } => run_queue(failed, json, &ctx).await?,
        Commands::Retry { id } => run_retry(id, &ctx).await?,
        Commands::Sync => run_sync(&ctx).await?,
        Commands::Watch { interval } => run_watch(interval, &ctx).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
