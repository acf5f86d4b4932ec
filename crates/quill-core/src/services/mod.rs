//! Store-backed services shared by every client.
//!
//! These wrap the repositories with the offline-first failure policy: storage
//! errors are reported to the [`Notifier`](crate::notify::Notifier) and turned
//! into safe defaults instead of being returned to the caller.

mod cache;
mod queue;
mod store;

pub use cache::Cache;
pub use queue::OperationQueue;
pub use store::Store;
