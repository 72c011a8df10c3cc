//! Core pipeline stages.
//!
//! This module contains:
//! - The batch codec (LZW + base64 with a plain fallback)
//! - The batcher that cuts compressed batches from pending records
//! - Temporal detectors deriving rage-click and typing-cadence signals
//! - Debounce and ticker state machines used by the pipeline tick

pub mod batcher;
pub mod compress;
pub mod debounce;
pub mod rage_click;
pub mod typing;

// Re-export commonly used types
pub use batcher::{BatchReport, Batcher, Enqueued, FlushReason};
pub use compress::{compress, decompress, Compressor};
pub use debounce::{Debouncer, Ticker};
pub use rage_click::{ClickPoint, RageClickDetector, RageClickSignal, Viewport};
pub use typing::{TypingCadenceSignal, TypingCadenceTracker};
