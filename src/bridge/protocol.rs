//! Request/response messages exchanged with the collector.
//!
//! ```text
//! PING {}                 -> {ok, pong, ts}
//! ENQUEUE {payload}       -> {ok, queued}
//! GET_PENDING_COUNT {}    -> {ok, count}
//! FLUSH_QUEUE {}          -> {ok, flushed, sample}
//! CLEAR_QUEUE {}          -> {ok, cleared}
//! malformed / unknown     -> {ok: false, error: "invalid_message" | "unknown_type"}
//! ```

use crate::collector::QueueItem;
use crate::error::ValidationError;
use crate::event::EventRecord;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Ping,
    Enqueue { payload: EventRecord },
    GetPendingCount,
    FlushQueue,
    ClearQueue,
}

impl Request {
    /// Wire name of the request type.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Ping => "PING",
            Request::Enqueue { .. } => "ENQUEUE",
            Request::GetPendingCount => "GET_PENDING_COUNT",
            Request::FlushQueue => "FLUSH_QUEUE",
            Request::ClearQueue => "CLEAR_QUEUE",
        }
    }

    /// Validate an untyped message.
    ///
    /// Anything without a string `type` is [`ValidationError::InvalidMessage`];
    /// a type outside the protocol is [`ValidationError::UnknownType`]. A
    /// known type whose body does not fit is also an invalid message.
    pub fn parse(message: &Value) -> Result<Self, ValidationError> {
        let kind = message
            .as_object()
            .and_then(|m| m.get("type"))
            .and_then(Value::as_str)
            .ok_or(ValidationError::InvalidMessage)?;

        match kind {
            "PING" => Ok(Request::Ping),
            "GET_PENDING_COUNT" => Ok(Request::GetPendingCount),
            "FLUSH_QUEUE" => Ok(Request::FlushQueue),
            "CLEAR_QUEUE" => Ok(Request::ClearQueue),
            "ENQUEUE" => {
                let payload = message
                    .get("payload")
                    .cloned()
                    .ok_or(ValidationError::InvalidMessage)?;
                let payload = serde_json::from_value(payload)
                    .map_err(|_| ValidationError::InvalidMessage)?;
                Ok(Request::Enqueue { payload })
            }
            other => Err(ValidationError::UnknownType(other.to_string())),
        }
    }
}

/// Body of a response, distinguished by which fields are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Pong { pong: bool, ts: i64 },
    Queued { queued: bool },
    Count { count: usize },
    Flushed { flushed: usize, sample: Vec<QueueItem> },
    Cleared { cleared: bool },
    Error { error: String },
}

/// A collector response: `ok` plus the fields of its body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl Response {
    pub fn success(body: ResponseBody) -> Self {
        Self { ok: true, body }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            body: ResponseBody::Error {
                error: error.into(),
            },
        }
    }

    pub fn pong() -> Self {
        Self::success(ResponseBody::Pong {
            pong: true,
            ts: Utc::now().timestamp_millis(),
        })
    }

    pub fn invalid(error: &ValidationError) -> Self {
        Self::failure(error.code())
    }

    /// Error string of a failed response.
    pub fn error(&self) -> Option<&str> {
        match self.body {
            ResponseBody::Error { ref error } if !self.ok => Some(error),
            _ => None,
        }
    }

    /// Serialize to a JSON value; responses always serialize.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Response could not be serialized");
            serde_json::json!({ "ok": false, "error": e.to_string() })
        })
    }
}

/// Items drained by FLUSH_QUEUE, as reported back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushSummary {
    /// Total items removed from the queue
    pub flushed: usize,
    /// The oldest few of them
    pub sample: Vec<QueueItem>,
}
