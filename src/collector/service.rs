//! Message handling for the collector.
//!
//! [`CollectorService`] answers protocol messages against a [`QueueStore`].
//! [`CollectorHandle`] puts the service behind a single task so that every
//! queue mutation runs to completion before the next one starts.

use crate::bridge::protocol::{Request, Response, ResponseBody};
use crate::collector::queue::QueueStore;
use crate::collector::store::{FileStore, KvStore, MemoryStore};
use crate::config::{Config, QueueConfig};
use crate::error::{StoreError, TransportError};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Requests waiting for the collector task.
const MAILBOX_CAPACITY: usize = 1024;

pub struct CollectorService {
    queue: QueueStore,
    sample_size: usize,
}

impl CollectorService {
    pub fn new(store: Arc<dyn KvStore>, config: &QueueConfig) -> Self {
        Self {
            queue: QueueStore::new(store, config),
            sample_size: config.sample_size,
        }
    }

    /// Service backed by an in-memory store.
    pub fn in_memory(config: &QueueConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    /// Service persisting the queue under the configured data path.
    pub fn persistent(config: &Config) -> Self {
        Self::new(Arc::new(FileStore::new(config.queue_dir())), &config.queue)
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    /// Answer one message. Never fails: validation and store errors become
    /// `ok: false` responses.
    pub async fn handle(&self, message: &Value) -> Response {
        let request = match Request::parse(message) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected collector message");
                return Response::invalid(&e);
            }
        };

        let kind = request.kind();
        match self.execute(request).await {
            Ok(body) => Response::success(body),
            Err(e) => {
                tracing::error!(request = kind, error = %e, "Collector request failed");
                Response::failure(e.to_string())
            }
        }
    }

    async fn execute(&self, request: Request) -> Result<ResponseBody, StoreError> {
        match request {
            Request::Ping => Ok(Response::pong().body),
            Request::Enqueue { payload } => {
                let len = self.queue.enqueue(payload).await?;
                tracing::trace!(queued = len, "Enqueued record");
                Ok(ResponseBody::Queued { queued: true })
            }
            Request::GetPendingCount => Ok(ResponseBody::Count {
                count: self.queue.count().await?,
            }),
            Request::FlushQueue => {
                let flush = self.queue.flush().await?;
                tracing::info!(flushed = flush.count, "Queue flushed");
                let mut sample = flush.batch;
                sample.truncate(self.sample_size);
                Ok(ResponseBody::Flushed {
                    flushed: flush.count,
                    sample,
                })
            }
            Request::ClearQueue => {
                self.queue.clear().await?;
                tracing::info!("Queue cleared");
                Ok(ResponseBody::Cleared { cleared: true })
            }
        }
    }
}

type Envelope = (Value, oneshot::Sender<Value>);

/// Cloneable handle to a collector running on its own task.
#[derive(Debug, Clone)]
pub struct CollectorHandle {
    mailbox: mpsc::Sender<Envelope>,
}

impl CollectorHandle {
    /// Move `service` onto a task. The task ends once every handle is dropped.
    pub fn spawn(service: CollectorService) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Envelope>(MAILBOX_CAPACITY);

        let task = tokio::spawn(async move {
            tracing::debug!(key = service.queue().key(), "Collector started");
            while let Some((message, reply)) = rx.recv().await {
                let response = service.handle(&message).await;
                // caller may have given up on the answer
                let _ = reply.send(response.to_value());
            }
            tracing::debug!("Collector stopped");
        });

        (Self { mailbox: tx }, task)
    }

    /// Send a raw message and wait for the raw response.
    pub async fn request(&self, message: Value) -> Result<Value, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.mailbox
            .send((message, reply_tx))
            .await
            .map_err(|_| TransportError::Closed)?;
        reply_rx.await.map_err(|_| TransportError::NoResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventRecord, EventTag};
    use serde_json::json;

    fn enqueue_msg(seq: usize) -> Value {
        json!({
            "type": "ENQUEUE",
            "payload": EventRecord::new(EventTag::Key).with_field("seq", seq),
        })
    }

    #[tokio::test]
    async fn test_flush_on_empty_queue() {
        let service = CollectorService::in_memory(&QueueConfig::default());
        let response = service.handle(&json!({ "type": "FLUSH_QUEUE" })).await;
        assert_eq!(response.to_value(), json!({ "ok": true, "flushed": 0, "sample": [] }));
    }

    #[tokio::test]
    async fn test_flush_returns_first_twenty_as_sample() {
        let service = CollectorService::in_memory(&QueueConfig::default());
        for i in 0..25 {
            let response = service.handle(&enqueue_msg(i)).await;
            assert_eq!(response.to_value(), json!({ "ok": true, "queued": true }));
        }

        let count = service.handle(&json!({ "type": "GET_PENDING_COUNT" })).await;
        assert_eq!(count.body, ResponseBody::Count { count: 25 });

        let response = service.handle(&json!({ "type": "FLUSH_QUEUE" })).await;
        match response.body {
            ResponseBody::Flushed { flushed, sample } => {
                assert_eq!(flushed, 25);
                let seqs: Vec<u64> = sample
                    .iter()
                    .map(|i| i.record.payload["seq"].as_u64().unwrap())
                    .collect();
                assert_eq!(seqs, (0..20).collect::<Vec<u64>>());
            }
            other => panic!("unexpected body {other:?}"),
        }
        assert_eq!(service.queue().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejections_are_structured() {
        let service = CollectorService::in_memory(&QueueConfig::default());
        assert_eq!(
            service.handle(&json!({ "type": "REBOOT" })).await.to_value(),
            json!({ "ok": false, "error": "unknown_type" })
        );
        assert_eq!(
            service.handle(&json!(42)).await.to_value(),
            json!({ "ok": false, "error": "invalid_message" })
        );
    }

    #[tokio::test]
    async fn test_ping_and_clear() {
        let service = CollectorService::in_memory(&QueueConfig::default());
        let pong = service.handle(&json!({ "type": "PING" })).await.to_value();
        assert_eq!(pong["ok"], true);
        assert_eq!(pong["pong"], true);
        assert!(pong["ts"].as_i64().unwrap() > 0);

        service.handle(&enqueue_msg(0)).await;
        let cleared = service.handle(&json!({ "type": "CLEAR_QUEUE" })).await;
        assert_eq!(cleared.to_value(), json!({ "ok": true, "cleared": true }));
        assert_eq!(service.queue().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_becomes_error_response() {
        let dir = tempfile::tempdir().unwrap();
        let config = QueueConfig {
            key: "../bad key".to_string(),
            ..QueueConfig::default()
        };
        let service = CollectorService::new(Arc::new(FileStore::new(dir.path())), &config);
        let response = service.handle(&json!({ "type": "GET_PENDING_COUNT" })).await;
        assert!(!response.ok);
        assert!(response.error().unwrap().contains("invalid key"));
    }

    #[tokio::test]
    async fn test_handle_serializes_concurrent_enqueues() {
        let (handle, task) = CollectorHandle::spawn(CollectorService::in_memory(&QueueConfig::default()));

        let mut joins = Vec::new();
        for i in 0..50 {
            let handle = handle.clone();
            joins.push(tokio::spawn(async move { handle.request(enqueue_msg(i)).await }));
        }
        for join in joins {
            join.await.unwrap().unwrap();
        }

        let count = handle.request(json!({ "type": "GET_PENDING_COUNT" })).await.unwrap();
        assert_eq!(count["count"], 50);

        drop(handle);
        task.await.unwrap();
    }
}
