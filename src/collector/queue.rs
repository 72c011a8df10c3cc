//! Capped, persisted delivery queue.
//!
//! The whole queue lives under a single key as a JSON array. Every operation
//! is a load-modify-persist cycle against the backing [`KvStore`]; callers
//! that share one store must serialize their calls (see
//! [`CollectorHandle`](crate::collector::CollectorHandle)).

use crate::collector::store::KvStore;
use crate::config::QueueConfig;
use crate::error::StoreError;
use crate::event::EventRecord;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A record as held by the queue, stamped with its enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Milliseconds since the Unix epoch at enqueue
    #[serde(rename = "_ts")]
    pub enqueued_at: i64,
    #[serde(flatten)]
    pub record: EventRecord,
}

impl QueueItem {
    pub fn new(record: EventRecord) -> Self {
        Self {
            enqueued_at: Utc::now().timestamp_millis(),
            record,
        }
    }
}

/// Result of taking everything out of the queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueFlush {
    pub count: usize,
    pub batch: Vec<QueueItem>,
}

pub struct QueueStore {
    store: Arc<dyn KvStore>,
    key: String,
    max_items: usize,
}

impl QueueStore {
    pub fn new(store: Arc<dyn KvStore>, config: &QueueConfig) -> Self {
        Self {
            store,
            key: config.key.clone(),
            max_items: config.max_items.max(1),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Append a record, dropping the oldest beyond capacity. Returns the new
    /// length.
    ///
    /// Stored entries are carried over untouched, including ones this
    /// version cannot read.
    pub async fn enqueue(&self, record: EventRecord) -> Result<usize, StoreError> {
        let mut entries = self.load().await?;
        entries.push(serde_json::to_value(QueueItem::new(record))?);
        if entries.len() > self.max_items {
            let excess = entries.len() - self.max_items;
            entries.drain(..excess);
        }
        let len = entries.len();
        self.persist(entries).await?;
        Ok(len)
    }

    /// Take the whole queue and leave it empty.
    ///
    /// `count` covers every stored entry; `batch` holds the readable ones.
    pub async fn flush(&self) -> Result<QueueFlush, StoreError> {
        let entries = self.load().await?;
        if entries.is_empty() {
            return Ok(QueueFlush::default());
        }
        self.persist(Vec::new()).await?;
        Ok(QueueFlush {
            count: entries.len(),
            batch: self.parse(entries),
        })
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.load().await?.len())
    }

    /// Persist an empty queue regardless of current contents.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.persist(Vec::new()).await
    }

    /// Every readable queued record, oldest first.
    pub async fn items(&self) -> Result<Vec<QueueItem>, StoreError> {
        let entries = self.load().await?;
        Ok(self.parse(entries))
    }

    async fn load(&self) -> Result<Vec<Value>, StoreError> {
        match self.store.get(&self.key).await? {
            Some(Value::Array(entries)) => Ok(entries),
            Some(other) => {
                tracing::warn!(key = %self.key, kind = ?other, "Queue slot is not an array, treating as empty");
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    fn parse(&self, entries: Vec<Value>) -> Vec<QueueItem> {
        let total = entries.len();
        let items: Vec<QueueItem> = entries
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        if items.len() != total {
            tracing::warn!(
                key = %self.key,
                unreadable = total - items.len(),
                "Queue holds entries that are not records"
            );
        }
        items
    }

    async fn persist(&self, entries: Vec<Value>) -> Result<(), StoreError> {
        self.store.set(&self.key, Value::Array(entries)).await
    }
}
