//! quill-core - Core library for Quill
//!
//! Offline-first access to a server-owned collection of posts: a durable
//! local cache, a queue of mutations made while offline, and the
//! synchronizer that replays them once the server is reachable again.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod services;
pub mod sync;
pub mod transport;
pub mod util;

#[cfg(test)]
mod testing;

pub use config::ClientConfig;
pub use connectivity::{watch_reachability, ConnectivityMonitor, ConnectivitySignal};
pub use error::{Error, Result};
pub use models::{NewOperation, OperationId, OperationStatus, OperationType, PendingOperation, Post};
pub use notify::{Notice, Notifier, SilentNotifier, TracingNotifier};
pub use services::{Cache, OperationQueue, Store};
pub use sync::{BackoffConfig, DrainSummary, RetryPolicy, SyncOutcome, Synchronizer};
pub use transport::{HttpTransport, Transport};
