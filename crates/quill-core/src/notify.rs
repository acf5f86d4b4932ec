//! User-visible failure reporting.
//!
//! The core never fails a caller because the store or the server misbehaved;
//! it reports through a [`Notifier`] instead and carries on.

use std::fmt;

use crate::models::{OperationId, OperationType};

/// Sink for user-visible error messages. Implementations must not panic.
pub trait Notifier: Send + Sync {
    /// Surface an error message to the user (fire-and-forget)
    fn report_error(&self, message: &str);

    /// Surface a [`Notice`]
    fn notify(&self, notice: &Notice) {
        self.report_error(&notice.to_string());
    }
}

/// Failures the core reports to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    CacheReadFailure,
    CacheWriteFailure,
    QueueReadFailure,
    QueueWriteFailure,
    SyncFailure {
        operation: OperationId,
        op_type: OperationType,
        error: String,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheReadFailure => {
                f.write_str("Failed to read from cache. The local store may be unavailable.")
            }
            Self::CacheWriteFailure => f.write_str(
                "Failed to write to cache. The local store may be unavailable; try restarting.",
            ),
            Self::QueueReadFailure => f.write_str(
                "Failed to read pending operations. The local store may be unavailable.",
            ),
            Self::QueueWriteFailure => f.write_str(
                "Failed to queue offline operation. The local store may be unavailable.",
            ),
            Self::SyncFailure {
                operation,
                op_type,
                error,
            } => write!(f, "Failed to sync {op_type} (operation {operation}): {error}"),
        }
    }
}

/// Notifier that writes messages to the `tracing` error log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn report_error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

/// Notifier that drops every message
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn report_error(&self, _message: &str) {}
}
