use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Edit posts offline and sync them when the server is reachable")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List cached posts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one cached post
    Show {
        /// Post ID (negative for posts not yet on the server)
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },
    /// Create a post locally and queue it for the server
    #[command(alias = "new")]
    Add {
        /// Post title
        #[arg(long)]
        title: String,
        /// Post body
        #[arg(long, default_value = "")]
        description: String,
        /// Create the post unpublished
        #[arg(long)]
        inactive: bool,
    },
    /// Edit a cached post and queue the change
    Edit {
        /// Post ID
        #[arg(allow_negative_numbers = true)]
        id: i64,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New body
        #[arg(long)]
        description: Option<String>,
        /// Publish or unpublish
        #[arg(long, value_name = "BOOL")]
        active: Option<bool>,
    },
    /// Delete a cached post and queue the deletion
    Delete {
        /// Post ID
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },
    /// Replace the cache with the server's post list
    Pull,
    /// Show queued operations
    Queue {
        /// Only failed operations
        #[arg(long)]
        failed: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Requeue failed operations (all when no ID is given)
    Retry {
        /// Operation ID
        id: Option<i64>,
    },
    /// Send queued operations to the server
    Sync,
    /// Keep running and sync whenever the server becomes reachable
    Watch {
        /// Seconds between reachability checks
        #[arg(long, value_name = "SECS", default_value = "15")]
        interval: u64,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
