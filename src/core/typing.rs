//! Typing cadence estimation.
//!
//! Per subject (usually an input element) the tracker keeps the last keystroke
//! time and a rolling list of inter-key intervals. Every `report_every`
//! recorded intervals it reports the mean interval.

use crate::config::TypingConfig;
use crate::event::{EventRecord, EventTag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Cadence estimate for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingCadenceSignal {
    pub subject: String,
    /// Mean inter-key interval over the rolling list, rounded
    pub mean_interval_ms: i64,
    /// Intervals the mean was computed from
    pub sample_count: usize,
    pub observed_at: DateTime<Utc>,
}

impl TypingCadenceSignal {
    pub fn to_record(&self, page_url: &str) -> EventRecord {
        EventRecord::at(EventTag::TypingSpeed, self.observed_at)
            .with_field("pageUrl", page_url)
            .with_field("subject", &self.subject)
            .with_field("avgMsBetweenKeys", self.mean_interval_ms)
            .with_field("sampleCount", self.sample_count)
    }
}

#[derive(Debug)]
struct SubjectState {
    last: DateTime<Utc>,
    intervals: VecDeque<i64>,
    /// Intervals ever recorded, not capped
    recorded: u64,
}

/// Rolling per-subject interval statistics.
#[derive(Debug)]
pub struct TypingCadenceTracker {
    max_intervals: usize,
    report_every: u64,
    max_subjects: usize,
    subjects: HashMap<String, SubjectState>,
}

impl TypingCadenceTracker {
    pub fn new(config: &TypingConfig) -> Self {
        Self {
            max_intervals: config.max_intervals.max(1),
            report_every: config.report_every.max(1),
            max_subjects: config.max_subjects.max(1),
            subjects: HashMap::new(),
        }
    }

    /// Feed one keystroke for `subject` at `timestamp`.
    ///
    /// The first keystroke of a subject only starts tracking.
    pub fn on(&mut self, subject: &str, timestamp: DateTime<Utc>) -> Option<TypingCadenceSignal> {
        let Some(state) = self.subjects.get_mut(subject) else {
            self.evict_if_full();
            self.subjects.insert(
                subject.to_string(),
                SubjectState {
                    last: timestamp,
                    intervals: VecDeque::with_capacity(self.max_intervals),
                    recorded: 0,
                },
            );
            return None;
        };

        let interval = (timestamp - state.last).num_milliseconds().max(0);
        state.last = timestamp;
        state.intervals.push_back(interval);
        if state.intervals.len() > self.max_intervals {
            state.intervals.pop_front();
        }
        state.recorded += 1;

        if state.recorded % self.report_every != 0 {
            return None;
        }

        let sum: i64 = state.intervals.iter().sum();
        let mean = sum as f64 / state.intervals.len() as f64;
        Some(TypingCadenceSignal {
            subject: subject.to_string(),
            mean_interval_ms: mean.round() as i64,
            sample_count: state.intervals.len(),
            observed_at: timestamp,
        })
    }

    /// Subjects currently tracked.
    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    /// Intervals currently held for `subject`.
    pub fn interval_count(&self, subject: &str) -> usize {
        self.subjects
            .get(subject)
            .map(|s| s.intervals.len())
            .unwrap_or(0)
    }

    fn evict_if_full(&mut self) {
        if self.subjects.len() < self.max_subjects {
            return;
        }
        let stalest = self
            .subjects
            .iter()
            .min_by_key(|(_, s)| s.last)
            .map(|(k, _)| k.clone());
        if let Some(key) = stalest {
            tracing::debug!(subject = %key, "Evicting stale typing subject");
            self.subjects.remove(&key);
        }
    }
}
