//! Server transport used by the synchronizer.

mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

pub use http::HttpTransport;

/// JSON transport to the authoritative server.
///
/// Implementations must return an error for every non-success outcome so
/// the synchronizer can record the failure on the queue entry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a resource and return the decoded body
    async fn get(&self, path: &str) -> Result<Value>;

    /// POST a JSON body. For creates the response carries the new id under `data.id`.
    async fn post(&self, path: &str, body: &Value) -> Result<Value>;

    /// PATCH a JSON body
    async fn patch(&self, path: &str, body: &Value) -> Result<Value>;

    /// DELETE a resource
    async fn delete(&self, path: &str) -> Result<Value>;
}

/// Server-assigned id in a create response (`{"data": {"id": 42, ...}}`)
pub fn created_id(response: &Value) -> Option<i64> {
    response
        .get("data")
        .and_then(|data| data.get("id"))
        .and_then(Value::as_i64)
}
