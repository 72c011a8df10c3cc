//! Error types for the behavior pipeline.
//!
//! Every failure degrades to a returned value; none of these are meant to
//! abort the owning process.

use thiserror::Error;

/// A request that could not be understood by the collector.
///
/// Recovered locally and answered with an `ok: false` response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Message was not an object with a string `type` field, or a known
    /// type carried a malformed body
    #[error("invalid message")]
    InvalidMessage,

    /// Message type is not part of the protocol
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

impl ValidationError {
    /// Stable wire code for the `error` field of a response.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidMessage => "invalid_message",
            ValidationError::UnknownType(_) => "unknown_type",
        }
    }

    /// Map a wire code back to a validation error, if it is one.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "invalid_message" => Some(ValidationError::InvalidMessage),
            "unknown_type" => Some(ValidationError::UnknownType(String::new())),
            _ => None,
        }
    }
}

/// Delivery failure on the channel between producer and collector.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The collector end of the channel is gone
    #[error("channel closed")]
    Closed,

    /// The collector dropped the request without answering
    #[error("collector dropped the request without a response")]
    NoResponse,

    /// Error reported by the underlying channel
    #[error("channel error: {0}")]
    Channel(String),

    /// Non-success HTTP status from a remote collector
    #[error("collector returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request could not be encoded for the channel
    #[error("failed to encode request: {0}")]
    Encode(String),
}

/// Failure of the durable key-value backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Failure decoding a compressed payload.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decoded payload is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("invalid dictionary code {0}")]
    InvalidCode(u32),
}

/// Error returned by the typed [`DeliveryBridge`](crate::bridge::DeliveryBridge) helpers.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("collector rejected request: {0}")]
    Validation(ValidationError),

    /// The collector answered `ok: false` for a reason other than validation
    #[error("collector error: {0}")]
    Remote(String),

    /// The collector answered with a body that does not match the request
    #[error("unexpected response from collector")]
    UnexpectedResponse,
}

/// Errors that can occur while replaying recorded events.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Source is already running")]
    AlreadyRunning,

    #[error("Source input already consumed")]
    Exhausted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Unknown feature {0}")]
    UnknownFeature(String),
}
