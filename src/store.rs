use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// A persisted call: where it is in the flow and its serialized domain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub call_guid: String,
    pub state: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(call_guid: impl Into<String>, state: impl Into<String>, data: Value) -> Self {
        let now = Utc::now();
        Self {
            call_guid: call_guid.into(),
            state: state.into(),
            data,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update(&mut self, state: impl Into<String>, data: Value) {
        self.state = state.into();
        self.data = data;
        self.updated_at = Utc::now();
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, call_guid: &str) -> Result<Option<SessionRecord>>;
    async fn save(&self, record: SessionRecord) -> Result<()>;
    async fn remove(&self, call_guid: &str) -> Result<()>;
}

pub struct InMemorySessionStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, call_guid: &str) -> Result<Option<SessionRecord>> {
        let records = self.records.lock().await;
        Ok(records.get(call_guid).cloned())
    }

    async fn save(&self, record: SessionRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        records.insert(record.call_guid.clone(), record);
        Ok(())
    }

    async fn remove(&self, call_guid: &str) -> Result<()> {
        let mut records = self.records.lock().await;
        records.remove(call_guid);
        Ok(())
    }
}
