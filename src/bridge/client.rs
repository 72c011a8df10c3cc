//! Typed request/response client for the collector.

use crate::bridge::channel::Channel;
use crate::bridge::protocol::{FlushSummary, Request, Response, ResponseBody};
use crate::error::{BridgeError, TransportError, ValidationError};
use crate::event::EventRecord;
use serde_json::Value;
use std::sync::Arc;

/// Sends protocol requests over a [`Channel`].
///
/// Each call is independent. A dropped future simply discards the late
/// response.
#[derive(Clone)]
pub struct DeliveryBridge {
    channel: Arc<dyn Channel>,
}

impl DeliveryBridge {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }

    /// Send an untyped message and return the untyped response.
    pub async fn send_raw(&self, message: Value) -> Result<Value, TransportError> {
        self.channel.send(message).await
    }

    /// Send a request. `ok: false` answers are still `Ok` here.
    pub async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let message =
            serde_json::to_value(request).map_err(|e| TransportError::Encode(e.to_string()))?;
        let raw = self.channel.send(message).await?;
        serde_json::from_value(raw)
            .map_err(|e| TransportError::Channel(format!("unreadable response: {e}")))
    }

    async fn call(&self, request: Request) -> Result<ResponseBody, BridgeError> {
        let response = self.send(&request).await?;
        if let Some(error) = response.error() {
            return Err(match ValidationError::from_code(error) {
                Some(v) => BridgeError::Validation(v),
                None => BridgeError::Remote(error.to_string()),
            });
        }
        if !response.ok {
            return Err(BridgeError::UnexpectedResponse);
        }
        Ok(response.body)
    }

    /// Round-trip check; returns the collector's clock in epoch milliseconds.
    pub async fn ping(&self) -> Result<i64, BridgeError> {
        match self.call(Request::Ping).await? {
            ResponseBody::Pong { pong: true, ts } => Ok(ts),
            _ => Err(BridgeError::UnexpectedResponse),
        }
    }

    pub async fn enqueue(&self, record: EventRecord) -> Result<(), BridgeError> {
        match self.call(Request::Enqueue { payload: record }).await? {
            ResponseBody::Queued { queued: true } => Ok(()),
            _ => Err(BridgeError::UnexpectedResponse),
        }
    }

    pub async fn pending_count(&self) -> Result<usize, BridgeError> {
        match self.call(Request::GetPendingCount).await? {
            ResponseBody::Count { count } => Ok(count),
            _ => Err(BridgeError::UnexpectedResponse),
        }
    }

    pub async fn flush_queue(&self) -> Result<FlushSummary, BridgeError> {
        match self.call(Request::FlushQueue).await? {
            ResponseBody::Flushed { flushed, sample } => Ok(FlushSummary { flushed, sample }),
            _ => Err(BridgeError::UnexpectedResponse),
        }
    }

    pub async fn clear_queue(&self) -> Result<(), BridgeError> {
        match self.call(Request::ClearQueue).await? {
            ResponseBody::Cleared { cleared: true } => Ok(()),
            _ => Err(BridgeError::UnexpectedResponse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::channel::LocalChannel;
    use crate::collector::{CollectorHandle, CollectorService};
    use crate::config::QueueConfig;
    use crate::event::EventTag;
    use async_trait::async_trait;
    use serde_json::json;

    struct Refusing;

    #[async_trait]
    impl Channel for Refusing {
        async fn send(&self, _message: Value) -> Result<Value, TransportError> {
            Err(TransportError::Channel("receiving end does not exist".to_string()))
        }
    }

    struct Canned(Value);

    #[async_trait]
    impl Channel for Canned {
        async fn send(&self, _message: Value) -> Result<Value, TransportError> {
            Ok(self.0.clone())
        }
    }

    fn local_bridge() -> DeliveryBridge {
        let (handle, _task) =
            CollectorHandle::spawn(CollectorService::in_memory(&QueueConfig::default()));
        DeliveryBridge::new(Arc::new(LocalChannel::new(handle)))
    }

    #[tokio::test]
    async fn test_typed_roundtrip() {
        let bridge = local_bridge();
        assert!(bridge.ping().await.unwrap() > 0);

        for i in 0..3 {
            bridge
                .enqueue(EventRecord::new(EventTag::Paste).with_field("seq", i))
                .await
                .unwrap();
        }
        assert_eq!(bridge.pending_count().await.unwrap(), 3);

        let summary = bridge.flush_queue().await.unwrap();
        assert_eq!(summary.flushed, 3);
        assert_eq!(summary.sample.len(), 3);
        assert_eq!(summary.sample[0].record.tag, EventTag::Paste);

        bridge.clear_queue().await.unwrap();
        assert_eq!(bridge.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_type_is_a_response_not_a_failure() {
        let bridge = local_bridge();
        let raw = bridge.send_raw(json!({ "type": "SELF_DESTRUCT" })).await.unwrap();
        assert_eq!(raw, json!({ "ok": false, "error": "unknown_type" }));
    }

    #[tokio::test]
    async fn test_transport_error_is_surfaced() {
        let bridge = DeliveryBridge::new(Arc::new(Refusing));
        let err = bridge.ping().await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(TransportError::Channel(_))));
    }

    #[tokio::test]
    async fn test_error_codes_map_to_variants() {
        let bridge = DeliveryBridge::new(Arc::new(Canned(
            json!({ "ok": false, "error": "invalid_message" }),
        )));
        assert!(matches!(
            bridge.pending_count().await,
            Err(BridgeError::Validation(ValidationError::InvalidMessage))
        ));

        let bridge = DeliveryBridge::new(Arc::new(Canned(json!({ "ok": false, "error": "disk full" }))));
        assert!(matches!(bridge.clear_queue().await, Err(BridgeError::Remote(m)) if m == "disk full"));

        let bridge = DeliveryBridge::new(Arc::new(Canned(json!({ "ok": true, "count": 1 }))));
        assert!(matches!(bridge.ping().await, Err(BridgeError::UnexpectedResponse)));
    }

    #[tokio::test]
    async fn test_closed_collector() {
        let (handle, task) =
            CollectorHandle::spawn(CollectorService::in_memory(&QueueConfig::default()));
        task.abort();
        let _ = task.await;

        let bridge = DeliveryBridge::new(Arc::new(LocalChannel::new(handle)));
        assert!(matches!(
            bridge.ping().await,
            Err(BridgeError::Transport(TransportError::Closed))
        ));
    }
}
