//! Batching of shaped records.
//!
//! Records accumulate in a pending list. A flush takes the whole list in one
//! step (the list is swapped out under the lock before anything else
//! happens), serializes it with a capture timestamp, compresses it and
//! produces a [`BatchReport`]. Flushes happen on demand, on a fixed interval
//! while the timer runs, and once more at teardown.

use crate::core::compress::Compressor;
use crate::event::{safe_stringify, EventRecord, EventTag};
use crate::transparency::SharedStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Why a batch was cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
    Manual,
    Timer,
    Teardown,
}

/// Summary of one flushed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub captured_at: DateTime<Utc>,
    pub reason: FlushReason,
    pub event_count: usize,
    /// Bytes of serialized JSON before compression
    pub uncompressed_size: usize,
    /// Length of the base64 text after compression
    pub compressed_size: usize,
    /// The encoded batch, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed: Option<String>,
}

impl BatchReport {
    /// Shape the summary as a `[BatchLogger]` record.
    pub fn to_record(&self) -> EventRecord {
        let mut record = EventRecord::at(EventTag::Batch, self.captured_at)
            .with_field("reason", self.reason)
            .with_field("events", self.event_count)
            .with_field("originalSize", self.uncompressed_size)
            .with_field("compressedBase64Length", self.compressed_size);
        if let Some(ref compressed) = self.compressed {
            record.insert("compressed", compressed);
        }
        record
    }
}

/// Serialized form of a batch.
#[derive(Serialize)]
struct BatchEnvelope<'a> {
    time: DateTime<Utc>,
    batch: &'a [EventRecord],
}

/// Outcome of [`Batcher::enqueue`].
#[derive(Debug, Clone, PartialEq)]
pub enum Enqueued {
    /// Held until the next flush
    Buffered,
    /// Batching is off; the record is handed straight back for emission
    Bypassed(EventRecord),
}

struct Shared {
    pending: Mutex<Vec<EventRecord>>,
    batching: AtomicBool,
    compressor: Compressor,
    reports: Option<UnboundedSender<BatchReport>>,
    stats: Option<SharedStats>,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, Vec<EventRecord>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn flush(&self, reason: FlushReason, include_payload: bool) -> Option<BatchReport> {
        let batch = {
            let mut pending = self.pending();
            if pending.is_empty() {
                return None;
            }
            std::mem::take(&mut *pending)
        };

        let captured_at = Utc::now();
        let json = safe_stringify(&BatchEnvelope {
            time: captured_at,
            batch: &batch,
        });
        let compressed = self.compressor.compress(&json);

        let report = BatchReport {
            captured_at,
            reason,
            event_count: batch.len(),
            uncompressed_size: json.len(),
            compressed_size: compressed.len(),
            compressed: include_payload.then_some(compressed),
        };

        tracing::info!(
            tag = EventTag::Batch.label(),
            reason = ?reason,
            events = report.event_count,
            original_size = report.uncompressed_size,
            compressed_len = report.compressed_size,
            "Batch flushed"
        );

        if let Some(ref stats) = self.stats {
            stats.record_batch(
                report.event_count as u64,
                report.uncompressed_size as u64,
                report.compressed_size as u64,
            );
        }
        if let Some(ref reports) = self.reports {
            // receiver gone means nobody is listening any more
            let _ = reports.send(report.clone());
        }

        Some(report)
    }
}

enum TimerState {
    Stopped,
    Running(JoinHandle<()>),
}

/// Accumulates records and cuts compressed batches.
pub struct Batcher {
    shared: Arc<Shared>,
    interval: Duration,
    timer: Mutex<TimerState>,
}

impl Batcher {
    /// Create a batcher flushing every `interval` once started.
    pub fn new(interval: Duration, batching: bool) -> Self {
        Self::with_options(interval, batching, None, None)
    }

    /// Create a batcher that also pushes every report to `reports`.
    pub fn with_reports(
        interval: Duration,
        batching: bool,
        reports: UnboundedSender<BatchReport>,
        stats: Option<SharedStats>,
    ) -> Self {
        Self::with_options(interval, batching, Some(reports), stats)
    }

    /// Create a batcher with an optional report channel and stats sink.
    pub fn with_options(
        interval: Duration,
        batching: bool,
        reports: Option<UnboundedSender<BatchReport>>,
        stats: Option<SharedStats>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(Vec::new()),
                batching: AtomicBool::new(batching),
                compressor: Compressor::default(),
                reports,
                stats,
            }),
            interval: interval.max(Duration::from_millis(1)),
            timer: Mutex::new(TimerState::Stopped),
        }
    }

    /// Append a record, or hand it back if batching is disabled.
    pub fn enqueue(&self, record: EventRecord) -> Enqueued {
        if !self.shared.batching.load(Ordering::SeqCst) {
            tracing::info!(tag = record.tag.label(), record = %record.to_json(), "Event");
            return Enqueued::Bypassed(record);
        }
        self.shared.pending().push(record);
        Enqueued::Buffered
    }

    /// Cut a batch now. Returns `None` (and changes nothing) when empty.
    pub fn flush(&self, include_payload: bool) -> Option<BatchReport> {
        self.shared.flush(FlushReason::Manual, include_payload)
    }

    /// Best-effort flush at shutdown; the payload is not retained.
    pub fn flush_on_teardown(&self) -> Option<BatchReport> {
        self.shared.flush(FlushReason::Teardown, false)
    }

    /// Records waiting for the next flush.
    pub fn pending_count(&self) -> usize {
        self.shared.pending().len()
    }

    pub fn set_batching(&self, enabled: bool) {
        self.shared.batching.store(enabled, Ordering::SeqCst);
    }

    pub fn is_batching(&self) -> bool {
        self.shared.batching.load(Ordering::SeqCst)
    }

    /// Start the flush timer. Idempotent; returns `false` if no tokio runtime
    /// is available to drive it.
    pub fn start(&self) -> bool {
        let mut timer = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        if let TimerState::Running(ref handle) = *timer {
            if !handle.is_finished() {
                return true;
            }
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(error = %e, "No async runtime, batch timer not started");
                return false;
            }
        };

        let shared = Arc::clone(&self.shared);
        let period = self.interval;
        let handle = runtime.spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                shared.flush(FlushReason::Timer, true);
            }
        });
        *timer = TimerState::Running(handle);
        true
    }

    /// Stop the flush timer. Idempotent.
    pub fn stop(&self) {
        let mut timer = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        if let TimerState::Running(handle) = std::mem::replace(&mut *timer, TimerState::Stopped) {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        let timer = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        matches!(*timer, TimerState::Running(ref h) if !h.is_finished())
    }
}

impl Drop for Batcher {
    fn drop(&mut self) {
        self.stop();
    }
}
