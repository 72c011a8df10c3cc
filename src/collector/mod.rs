//! The collector side: a capped, persisted queue answering protocol messages.

pub mod queue;
pub mod service;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

pub use queue::{QueueFlush, QueueItem, QueueStore};
pub use service::{CollectorHandle, CollectorService};
pub use store::{FileStore, KvStore, MemoryStore};
