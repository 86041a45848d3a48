// In-memory implementations for examples and testing
//
// These implementations keep all data in memory, making them perfect for:
// - Unit and scenario tests that must not touch a real dialer
// - Running the CLI session against a scripted platform
// - Quick prototyping

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use url::Url;
use uuid::Uuid;

use crate::error::{StoreError, TransportError};
use crate::record::{Record, RecordKind};
use crate::traits::{ControlTransport, RecordStore};

// ============================================================================
// ScriptedTransport - Replays canned platform replies
// ============================================================================

/// A canned reply for one request
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Reply body returned immediately
    Text(String),
    /// Transport failure
    Fail(TransportError),
    /// Reply body returned after a delay
    Delayed(Duration, String),
}

#[derive(Debug, Default)]
struct ScriptState {
    queued: HashMap<String, VecDeque<ScriptedReply>>,
    defaults: HashMap<String, ScriptedReply>,
    requests: Vec<Url>,
}

/// Transport that answers by remote function name
///
/// Queued replies are consumed first, then the per-function default. A function
/// with neither gets an `ERROR:` reply.
#[derive(Debug, Default, Clone)]
pub struct ScriptedTransport {
    state: Arc<RwLock<ScriptState>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next call of `function`
    pub async fn push(&self, function: &str, reply: ScriptedReply) {
        self.state
            .write()
            .await
            .queued
            .entry(function.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Queue a text reply for the next call of `function`
    pub async fn respond(&self, function: &str, body: impl Into<String>) {
        self.push(function, ScriptedReply::Text(body.into())).await;
    }

    /// Reply used whenever nothing is queued for `function`
    pub async fn set_default(&self, function: &str, reply: ScriptedReply) {
        self.state
            .write()
            .await
            .defaults
            .insert(function.to_string(), reply);
    }

    /// Every request received, in order
    pub async fn requests(&self) -> Vec<Url> {
        self.state.read().await.requests.clone()
    }

    /// Requests received for one remote function
    pub async fn requests_for(&self, function: &str) -> Vec<Url> {
        self.state
            .read()
            .await
            .requests
            .iter()
            .filter(|url| function_of(url).as_deref() == Some(function))
            .cloned()
            .collect()
    }

    pub async fn request_count(&self, function: &str) -> usize {
        self.requests_for(function).await.len()
    }
}

/// Value of the `function` query parameter
pub fn function_of(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == "function")
        .map(|(_, v)| v.into_owned())
}

#[async_trait]
impl ControlTransport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<String, TransportError> {
        let function = function_of(url).unwrap_or_default();
        let reply = {
            let mut state = self.state.write().await;
            state.requests.push(url.clone());
            let queued = state.queued.get_mut(&function).and_then(VecDeque::pop_front);
            queued.or_else(|| state.defaults.get(&function).cloned())
        };

        match reply {
            Some(ScriptedReply::Text(body)) => Ok(body),
            Some(ScriptedReply::Fail(err)) => Err(err),
            Some(ScriptedReply::Delayed(delay, body)) => {
                tokio::time::sleep(delay).await;
                Ok(body)
            }
            None => Ok(format!("ERROR: no scripted reply for {}", function)),
        }
    }
}

// ============================================================================
// InMemoryRecordStore - Stores records in memory
// ============================================================================

/// In-memory record store keyed by kind and id
#[derive(Debug, Default, Clone)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<(RecordKind, Uuid), Record>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records of one kind
    pub async fn count(&self, kind: RecordKind) -> usize {
        self.records
            .read()
            .await
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

fn require_object(value: &serde_json::Value) -> Result<(), StoreError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(StoreError::Invalid("fields must be a JSON object".to_string()))
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create(&self, kind: RecordKind, fields: serde_json::Value) -> Result<Record, StoreError> {
        require_object(&fields)?;
        let now = Utc::now();
        let record = Record {
            id: Uuid::now_v7(),
            kind,
            fields,
            created_at: now,
            updated_at: now,
        };
        self.records
            .write()
            .await
            .insert((kind, record.id), record.clone());
        Ok(record)
    }

    async fn get(&self, kind: RecordKind, id: Uuid) -> Result<Record, StoreError> {
        self.records
            .read()
            .await
            .get(&(kind, id))
            .cloned()
            .ok_or(StoreError::NotFound { kind, id })
    }

    async fn update(
        &self,
        kind: RecordKind,
        id: Uuid,
        patch: serde_json::Value,
    ) -> Result<Record, StoreError> {
        require_object(&patch)?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&(kind, id))
            .ok_or(StoreError::NotFound { kind, id })?;

        if let (Some(fields), serde_json::Value::Object(patch)) = (record.fields.as_object_mut(), patch) {
            for (key, value) in patch {
                fields.insert(key, value);
            }
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn list(&self, kind: RecordKind) -> Result<Vec<Record>, StoreError> {
        let mut records: Vec<Record> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}
