//! Replay of recorded interaction records.
//!
//! A [`ReplaySource`] reads newline-delimited [`EventRecord`] JSON on a
//! capture thread and hands records over a bounded channel. It is also an
//! [`EventTarget`]: a record is only delivered while some listener is bound
//! to its document event, the same way a live page only reports events
//! somebody listens for.

use crate::error::SourceError;
use crate::event::{EventRecord, EventTag, EventTarget, HandlerId, ListenerOptions, RegistrationError};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

type Subscriptions = Arc<Mutex<HashSet<(String, HandlerId)>>>;

fn lock(subs: &Subscriptions) -> MutexGuard<'_, HashSet<(String, HandlerId)>> {
    subs.lock().unwrap_or_else(|e| e.into_inner())
}

/// Document event a record would have been raised by.
pub fn event_name(record: &EventRecord) -> Option<&'static str> {
    if record.tag == EventTag::NetworkStatus
        && record.payload.get("action").and_then(|v| v.as_str()) == Some("offline")
    {
        return Some("offline");
    }
    record.tag.dom_event()
}

/// Replays JSONL records from a file or any buffered reader.
pub struct ReplaySource {
    name: String,
    input: Mutex<Option<Box<dyn BufRead + Send>>>,
    sender: Mutex<Option<Sender<EventRecord>>>,
    receiver: Receiver<EventRecord>,
    subscriptions: Subscriptions,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ReplaySource {
    /// Open a JSONL file for replay.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = std::fs::File::open(path)?;
        Ok(Self::from_reader(
            path.display().to_string(),
            BufReader::new(file),
        ))
    }

    pub fn from_reader(name: impl Into<String>, reader: impl BufRead + Send + 'static) -> Self {
        let (sender, receiver) = bounded(10_000);
        Self {
            name: name.into(),
            input: Mutex::new(Some(Box::new(reader))),
            sender: Mutex::new(Some(sender)),
            receiver,
            subscriptions: Arc::new(Mutex::new(HashSet::new())),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Start the capture thread. The receiver disconnects once the input is
    /// exhausted or [`stop`](Self::stop) is called.
    pub fn start(&self) -> Result<(), SourceError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(SourceError::AlreadyRunning);
        }
        let reader = self
            .input
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(SourceError::Exhausted)?;
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(SourceError::Exhausted)?;

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let subscriptions = Arc::clone(&self.subscriptions);
        let name = self.name.clone();

        let spawned = thread::Builder::new()
            .name("replay-source".to_string())
            .spawn(move || {
                capture_loop(&name, reader, sender, &subscriptions, &running);
                running.store(false, Ordering::SeqCst);
            });
        match spawned {
            Ok(handle) => {
                *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e.into())
            }
        }
    }

    /// Stop capturing events.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the capture thread is still producing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for replayed records.
    pub fn receiver(&self) -> &Receiver<EventRecord> {
        &self.receiver
    }

    /// Try to receive a record without blocking.
    pub fn try_recv(&self) -> Option<EventRecord> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the capture thread to finish.
    pub fn join(&self) {
        if let Some(handle) = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            if handle.join().is_err() {
                tracing::error!(source = %self.name, "Replay thread panicked");
            }
        }
    }

    /// Whether any listener is bound to `event`.
    pub fn is_subscribed(&self, event: &str) -> bool {
        lock(&self.subscriptions).iter().any(|(e, _)| e == event)
    }
}

fn capture_loop(
    name: &str,
    reader: Box<dyn BufRead + Send>,
    sender: Sender<EventRecord>,
    subscriptions: &Subscriptions,
    running: &AtomicBool,
) {
    let mut delivered = 0usize;
    for (index, line) in reader.lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(source = name, error = %e, "Replay input failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let record: EventRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(source = name, line = index + 1, error = %e, "Skipping unreadable record");
                continue;
            }
        };

        let wanted = match event_name(&record) {
            Some(event) => lock(subscriptions).iter().any(|(e, _)| e == event),
            None => false,
        };
        if !wanted {
            tracing::trace!(tag = record.tag.label(), "No listener, record dropped");
            continue;
        }
        if sender.send(record).is_err() {
            break;
        }
        delivered += 1;
    }
    tracing::debug!(source = name, delivered, "Replay finished");
}

impl EventTarget for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_listener(
        &self,
        event: &str,
        handler: &HandlerId,
        _options: ListenerOptions,
    ) -> Result<(), RegistrationError> {
        lock(&self.subscriptions).insert((event.to_string(), handler.clone()));
        Ok(())
    }

    fn remove_listener(
        &self,
        event: &str,
        handler: &HandlerId,
        _options: ListenerOptions,
    ) -> Result<(), RegistrationError> {
        lock(&self.subscriptions).remove(&(event.to_string(), handler.clone()));
        Ok(())
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.stop();
    }
}
