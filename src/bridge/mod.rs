//! Delivery of records from the pipeline to a collector.

pub mod channel;
pub mod client;
pub mod protocol;

#[cfg(feature = "client")]
pub use channel::HttpChannel;
pub use channel::{Channel, LocalChannel};
pub use client::DeliveryBridge;
pub use protocol::{FlushSummary, Request, Response, ResponseBody};
