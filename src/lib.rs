//! Synheart Behavior Pipeline - interaction event batching, behavioral signal
//! detection and a persisted delivery queue.
//!
//! Producers hand the pipeline shaped interaction records (clicks, keys,
//! scrolls, clipboard and drag events, ...). The pipeline derives higher
//! level signals from them, batches and compresses them, and optionally
//! forwards each record to a collector that keeps a capped, persisted queue.
//!
//! # Guarantees
//!
//! - **Bounded state**: the delivery queue, detector windows and typing
//!   subjects are all capped
//! - **No fatal failures**: transport, store and serialization errors degrade
//!   to logged or returned values
//! - **Transparency**: everything processed is counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Producer process                          │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐             │
//! │  │   Source    │──▶│  Pipeline   │──▶│   Batcher   │──▶ reports  │
//! │  │ (listeners) │   │ (detectors) │   │(compressor) │             │
//! │  └─────────────┘   └─────────────┘   └─────────────┘             │
//! │                           │ ENQUEUE                               │
//! │                           ▼                                       │
//! │                    ┌─────────────┐                                │
//! │                    │   Bridge    │                                │
//! │                    └─────────────┘                                │
//! └───────────────────────────┼──────────────────────────────────────┘
//!                             ▼ local task or HTTP
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Collector: CollectorHandle ──▶ QueueStore ──▶ KvStore            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use synheart_behavior_pipeline::{
//!     bridge::{DeliveryBridge, LocalChannel},
//!     collector::{CollectorHandle, CollectorService},
//!     Config, EventRecord, EventTag, Pipeline,
//! };
//!
//! # async fn demo() {
//! let mut config = Config::default();
//! config.features.send_to_background = true;
//!
//! let (collector, _task) = CollectorHandle::spawn(CollectorService::in_memory(&config.queue));
//! let bridge = DeliveryBridge::new(Arc::new(LocalChannel::new(collector)));
//!
//! let mut pipeline = Pipeline::builder(config).bridge(bridge.clone()).build();
//! pipeline.dispatch(EventRecord::new(EventTag::Click)).await;
//!
//! let pending = bridge.pending_count().await;
//! # }
//! ```

pub mod bridge;
pub mod collector;
pub mod config;
pub mod core;
pub mod error;
pub mod event;
pub mod logging;
pub mod pipeline;
pub mod source;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use bridge::{Channel, DeliveryBridge, LocalChannel, Request, Response};
pub use collector::{CollectorHandle, CollectorService, FileStore, KvStore, MemoryStore, QueueStore};
pub use config::{Config, FeatureFlags};
pub use core::{compress, decompress, BatchReport, Batcher, Compressor};
pub use error::{
    BridgeError, CodecError, ConfigError, SourceError, StoreError, TransportError, ValidationError,
};
pub use event::{EventRecord, EventRegistry, EventTag};
pub use pipeline::{Dispatched, Pipeline};
pub use source::ReplaySource;
pub use transparency::{PipelineStats, SharedStats, StatsSnapshot};

#[cfg(feature = "client")]
pub use bridge::HttpChannel;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
