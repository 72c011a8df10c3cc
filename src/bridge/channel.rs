//! Transports carrying protocol messages to a collector.

use crate::collector::CollectorHandle;
use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
#[cfg(feature = "client")]
use std::time::Duration;

/// An asynchronous request/response channel.
///
/// Implementations report their own failures; there is no timeout or retry
/// at this layer.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn send(&self, message: Value) -> Result<Value, TransportError>;
}

/// Channel to a collector task in the same process.
#[derive(Debug, Clone)]
pub struct LocalChannel {
    collector: CollectorHandle,
}

impl LocalChannel {
    pub fn new(collector: CollectorHandle) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl Channel for LocalChannel {
    async fn send(&self, message: Value) -> Result<Value, TransportError> {
        self.collector.request(message).await
    }
}

/// Channel to a collector served over HTTP.
///
/// Like every [`Channel`], `send` waits as long as the transport does unless
/// a timeout is opted into with [`with_timeout`](HttpChannel::with_timeout);
/// an elapsed timeout surfaces as [`TransportError::Channel`].
#[cfg(feature = "client")]
pub struct HttpChannel {
    base_url: String,
    timeout: Option<Duration>,
    client: reqwest::Client,
}

#[cfg(feature = "client")]
impl HttpChannel {
    /// Create a channel posting to `<base_url>/message`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        Self::build(base_url.into(), None)
    }

    /// Create a channel whose requests fail after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        Self::build(base_url.into(), Some(timeout))
    }

    fn build(base_url: String, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Channel(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn message_url(&self) -> String {
        format!("{}/message", self.base_url)
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }

    /// Test connection to the collector.
    pub async fn test_connection(&self) -> Result<bool, TransportError> {
        let response = self
            .client
            .get(self.health_url())
            .send()
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

#[cfg(feature = "client")]
#[async_trait]
impl Channel for HttpChannel {
    async fn send(&self, message: Value) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(self.message_url())
            .json(&message)
            .send()
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Http {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))
    }
}
