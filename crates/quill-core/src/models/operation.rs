//! Pending operation model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::util::epoch_millis_now;

/// Local auto-increment identifier of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(i64);

impl OperationId {
    /// Wrap a raw row id
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw row id
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OperationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Kind of mutation a queue entry replays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    Create,
    Update,
    Delete,
}

impl OperationType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("unknown operation type: {other}"))),
        }
    }
}

/// Lifecycle status of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Waiting for the next drain
    Pending,
    /// Being replayed by the synchronizer
    Syncing,
    /// Confirmed by the server
    Completed,
    /// Last replay failed; waits for a retry
    Failed,
}

impl OperationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "syncing" => Ok(Self::Syncing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::InvalidInput(format!(
                "unknown operation status: {other}"
            ))),
        }
    }
}

/// A queued mutation that the server has not confirmed yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: OperationId,
    #[serde(rename = "type")]
    pub op_type: OperationType,
    /// Full or partial post snapshot; DELETE carries at least the id
    pub payload: Value,
    /// Collection path on the server, e.g. `blogs/`
    pub resource_path: String,
    /// Enqueue time (Unix ms), defines replay order
    pub timestamp: i64,
    pub status: OperationStatus,
    pub error: Option<String>,
    pub retry_count: u32,
    /// Time of the last failed attempt (ISO-8601)
    pub last_retry: Option<String>,
}

impl PendingOperation {
    /// Post id referenced by the payload, if any
    pub fn entity_id(&self) -> Option<i64> {
        self.payload.get("id").and_then(Value::as_i64)
    }

    /// Server path the operation is sent to.
    ///
    /// CREATE targets the collection; UPDATE and DELETE target
    /// `resource_path + id + "/"`.
    pub fn target_path(&self) -> Option<String> {
        match self.op_type {
            OperationType::Create => Some(self.resource_path.clone()),
            OperationType::Update | OperationType::Delete => self
                .entity_id()
                .map(|id| format!("{}{id}/", self.resource_path)),
        }
    }
}

/// A queue entry before it is persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub op_type: OperationType,
    pub payload: Value,
    pub resource_path: String,
    pub timestamp: i64,
}

impl NewOperation {
    /// Create an entry stamped with the current time
    pub fn new(op_type: OperationType, payload: Value, resource_path: impl Into<String>) -> Self {
        Self {
            op_type,
            payload,
            resource_path: resource_path.into(),
            timestamp: epoch_millis_now(),
        }
    }

    /// Override the enqueue timestamp
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}
