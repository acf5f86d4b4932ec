pub mod add;
pub mod common;
pub mod completions;
pub mod delete;
pub mod edit;
pub mod list;
pub mod pull;
pub mod queue;
pub mod retry;
pub mod show;
pub mod sync;
pub mod watch;
