//! Pipeline statistics.
//!
//! Counts what went through the pipeline so that collection is auditable.
//! Counters are atomics so the batch timer and the event loop can both
//! update them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running counters for one pipeline.
#[derive(Debug)]
pub struct PipelineStats {
    /// Records accepted by the pipeline
    records: AtomicU64,
    /// Derived signals (rage clicks, typing cadence)
    signals: AtomicU64,
    /// Batches cut by the batcher
    batches: AtomicU64,
    /// Records contained in those batches
    batched_records: AtomicU64,
    /// Serialized bytes before compression
    bytes_in: AtomicU64,
    /// Encoded bytes after compression
    bytes_out: AtomicU64,
    /// Records accepted by the collector
    forwarded: AtomicU64,
    /// Records the collector could not be reached for
    forward_failures: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            records: AtomicU64::new(0),
            signals: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            batched_records: AtomicU64::new(0),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            forward_failures: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats that accumulate across runs in `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!(error = %e, "Could not load previous pipeline stats");
        }

        stats
    }

    pub fn record_event(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_signal(&self) {
        self.signals.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a flushed batch and its sizes.
    pub fn record_batch(&self, records: u64, bytes_in: u64, bytes_out: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.batched_records.fetch_add(records, Ordering::Relaxed);
        self.bytes_in.fetch_add(bytes_in, Ordering::Relaxed);
        self.bytes_out.fetch_add(bytes_out, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forward_failure(&self) {
        self.forward_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records: self.records.load(Ordering::Relaxed),
            signals: self.signals.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            batched_records: self.batched_records.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            forward_failures: self.forward_failures.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        let ratio = if stats.bytes_in == 0 {
            0.0
        } else {
            stats.bytes_out as f64 / stats.bytes_in as f64
        };
        format!(
            "Pipeline Statistics:\n\
             - Records processed: {}\n\
             - Signals derived: {}\n\
             - Batches flushed: {} ({} records)\n\
             - Compression: {} -> {} bytes ({:.2})\n\
             - Forwarded to collector: {} ({} failed)\n\
             - Session duration: {} seconds",
            stats.records,
            stats.signals,
            stats.batches,
            stats.batched_records,
            stats.bytes_in,
            stats.bytes_out,
            ratio,
            stats.forwarded,
            stats.forward_failures,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.snapshot();
            let persisted = PersistedStats {
                records: stats.records,
                signals: stats.signals,
                batches: stats.batches,
                batched_records: stats.batched_records,
                bytes_in: stats.bytes_in,
                bytes_out: stats.bytes_out,
                forwarded: stats.forwarded,
                forward_failures: stats.forward_failures,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.records.store(persisted.records, Ordering::Relaxed);
                self.signals.store(persisted.signals, Ordering::Relaxed);
                self.batches.store(persisted.batches, Ordering::Relaxed);
                self.batched_records
                    .store(persisted.batched_records, Ordering::Relaxed);
                self.bytes_in.store(persisted.bytes_in, Ordering::Relaxed);
                self.bytes_out.store(persisted.bytes_out, Ordering::Relaxed);
                self.forwarded.store(persisted.forwarded, Ordering::Relaxed);
                self.forward_failures
                    .store(persisted.forward_failures, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.records,
            &self.signals,
            &self.batches,
            &self.batched_records,
            &self.bytes_in,
            &self.bytes_out,
            &self.forwarded,
            &self.forward_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub records: u64,
    pub signals: u64,
    pub batches: u64,
    pub batched_records: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub forwarded: u64,
    pub forward_failures: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    records: u64,
    signals: u64,
    batches: u64,
    batched_records: u64,
    bytes_in: u64,
    bytes_out: u64,
    forwarded: u64,
    forward_failures: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared stats.
pub type SharedStats = Arc<PipelineStats>;

/// Create new shared stats.
pub fn create_shared_stats() -> SharedStats {
    Arc::new(PipelineStats::new())
}

/// Create new shared stats with persistence.
pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedStats {
    Arc::new(PipelineStats::with_persistence(path))
}
