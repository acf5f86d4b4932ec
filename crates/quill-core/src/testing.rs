//! Test doubles shared by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::notify::Notifier;
use crate::services::{Cache, OperationQueue, Store};
use crate::transport::Transport;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

/// In-memory server: assigns ids on POST and fails selected calls.
pub struct MockTransport {
    calls: Mutex<Vec<Call>>,
    failing_calls: HashSet<usize>,
    next_id: AtomicI64,
    delay: Option<Duration>,
    list_body: Value,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing_calls: HashSet::new(),
            next_id: AtomicI64::new(1),
            delay: None,
            list_body: json!([]),
        }
    }

    /// Fail the n-th call (1-based, counting every method)
    pub fn failing_call(mut self, n: usize) -> Self {
        self.failing_calls.insert(n);
        self
    }

    pub fn starting_id(self, id: i64) -> Self {
        self.next_id.store(id, Ordering::SeqCst);
        self
    }

    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_list_body(mut self, body: Value) -> Self {
        self.list_body = body;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(&self, method: &'static str, path: &str, body: Option<&Value>) -> Result<()> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                method,
                path: path.to_string(),
                body: body.cloned(),
            });
            calls.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_calls.contains(&index) {
            return Err(Error::Transport("Internal Server Error (500)".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, path: &str) -> Result<Value> {
        self.record("GET", path, None).await?;
        Ok(self.list_body.clone())
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.record("POST", path, Some(body)).await?;
        let mut data = body.clone();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Some(fields) = data.as_object_mut() {
            fields.insert("id".to_string(), json!(id));
        }
        Ok(json!({ "data": data }))
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        self.record("PATCH", path, Some(body)).await?;
        Ok(json!({ "data": body }))
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        self.record("DELETE", path, None).await?;
        Ok(Value::Null)
    }
}

/// Notifier that keeps every message for assertions
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn report_error(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Fresh in-memory store with a cache and queue wired to one recording notifier
pub async fn fixture() -> (Store, Cache, OperationQueue, Arc<RecordingNotifier>) {
    let store = Store::open_in_memory().await.unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let cache = Cache::new(store.clone(), notifier.clone());
    let queue = OperationQueue::new(store.clone(), notifier.clone());
    (store, cache, queue, notifier)
}

/// Break the store so every following query fails
pub async fn break_store(store: &Store) {
    let db = store.lock().await;
    db.connection()
        .execute("DROP TABLE entities", ())
        .await
        .unwrap();
    db.connection()
        .execute("DROP TABLE pending_operations", ())
        .await
        .unwrap();
}
