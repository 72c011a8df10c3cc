//! The producer-side pipeline.
//!
//! One [`Pipeline`] is built per instrumented document and owns every piece
//! of producer state: listener bookkeeping, both detectors, the batcher, the
//! debounce timers and the optional bridge to a collector. It is driven by
//! its owner's event loop through [`dispatch`](Pipeline::dispatch) for each
//! incoming record and [`tick`](Pipeline::tick) for the passage of time.

use crate::bridge::DeliveryBridge;
use crate::config::{Config, FeatureFlags};
use crate::core::{
    BatchReport, Batcher, ClickPoint, Debouncer, RageClickDetector, Ticker, TypingCadenceTracker,
    Viewport,
};
use crate::error::ConfigError;
use crate::event::{
    ActionType, EventRecord, EventRegistry, EventTag, EventTarget, HandlerId, ListenerOptions,
};
use crate::transparency::{create_shared_stats, SharedStats};
use crate::VERSION;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// What [`Pipeline::dispatch`] did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// Recorded right away
    Recorded,
    /// Held by a debouncer until a later tick
    Deferred,
    /// Only updated sampling state
    Tracked,
    /// Dropped: its feature is off, or it repeats a hover already seen
    Suppressed,
}

/// Whether records of `tag` are collected under `flags`.
pub fn is_enabled(flags: &FeatureFlags, tag: EventTag) -> bool {
    match tag {
        EventTag::Click => flags.click,
        EventTag::Key => flags.keydown,
        EventTag::Input => flags.input,
        EventTag::Change => flags.change,
        EventTag::Selection => flags.selection,
        EventTag::Focus | EventTag::Blur => flags.focus_blur,
        EventTag::Copy | EventTag::Cut | EventTag::Paste => flags.copy_cut_paste,
        EventTag::Scroll => flags.scroll,
        EventTag::HoverEnter | EventTag::HoverLeave => flags.hover,
        EventTag::MouseMove | EventTag::MouseSample => flags.mouse_sampling,
        EventTag::Resize | EventTag::Orientation => flags.resize_orientation,
        EventTag::NetworkStatus => flags.network_status,
        EventTag::BeforeUnload | EventTag::Visibility | EventTag::PageHide => flags.before_unload,
        EventTag::FormSubmit => flags.form_submit,
        EventTag::DragStart | EventTag::DragOver | EventTag::Drop => flags.drag_drop,
        EventTag::RageClick => flags.rage_click,
        EventTag::TypingSpeed => flags.typing_speed,
        EventTag::Batch | EventTag::Init => true,
    }
}

/// The listener set bound by [`Pipeline::install`]: event name and handler.
pub fn standard_listeners() -> Vec<(&'static str, HandlerId)> {
    let mut listeners: Vec<(&'static str, HandlerId)> = EventTag::INTERACTIONS
        .iter()
        .filter_map(|tag| tag.dom_event())
        .map(|event| (event, HandlerId::new(format!("on_{event}"))))
        .collect();
    listeners.push(("offline", HandlerId::new("on_offline")));
    listeners
}

#[derive(Debug, Clone, Copy)]
struct ScrollMark {
    x: f64,
    y: f64,
    at: DateTime<Utc>,
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    config: Config,
    bridge: Option<DeliveryBridge>,
    stats: Option<SharedStats>,
    reports: Option<UnboundedSender<BatchReport>>,
}

impl PipelineBuilder {
    /// Forward records to a collector through `bridge`.
    pub fn bridge(mut self, bridge: DeliveryBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn stats(mut self, stats: SharedStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Push every batch report to `reports`.
    pub fn reports(mut self, reports: UnboundedSender<BatchReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn build(self) -> Pipeline {
        let config = self.config;
        let stats = self.stats.unwrap_or_else(create_shared_stats);
        let batcher = Batcher::with_options(
            config.batch_interval,
            config.features.batching,
            self.reports,
            Some(Arc::clone(&stats)),
        );

        Pipeline {
            instance_id: Uuid::new_v4(),
            registry: EventRegistry::new(),
            rage: RageClickDetector::new(&config.rage_click),
            typing: TypingCadenceTracker::new(&config.typing),
            batcher,
            bridge: self.bridge,
            stats,
            scroll: Debouncer::new(config.scroll_debounce),
            pending_scroll: None,
            last_scroll: ScrollMark {
                x: 0.0,
                y: 0.0,
                at: Utc::now(),
            },
            resize: Debouncer::new(config.resize_debounce),
            pending_resize: None,
            mouse: Ticker::new(config.mouse_sample_interval),
            mouse_pos: (0.0, 0.0),
            hovered: HashSet::new(),
            config,
        }
    }
}

pub struct Pipeline {
    config: Config,
    instance_id: Uuid,
    registry: EventRegistry,
    rage: RageClickDetector,
    typing: TypingCadenceTracker,
    batcher: Batcher,
    bridge: Option<DeliveryBridge>,
    stats: SharedStats,
    scroll: Debouncer,
    pending_scroll: Option<EventRecord>,
    last_scroll: ScrollMark,
    resize: Debouncer,
    pending_resize: Option<EventRecord>,
    mouse: Ticker,
    mouse_pos: (f64, f64),
    hovered: HashSet<String>,
}

impl Pipeline {
    pub fn builder(config: Config) -> PipelineBuilder {
        PipelineBuilder {
            config,
            bridge: None,
            stats: None,
            reports: None,
        }
    }

    pub fn new(config: Config) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn features(&self) -> &FeatureFlags {
        &self.config.features
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn viewport(&self) -> Viewport {
        self.rage.viewport()
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.rage.set_viewport(viewport);
    }

    /// Records waiting for the next batch.
    pub fn pending_batch_count(&self) -> usize {
        self.batcher.pending_count()
    }

    /// Toggle a feature at runtime, returning its new value.
    pub fn set_feature(&mut self, name: &str, value: bool) -> Result<bool, ConfigError> {
        let value = self.config.features.set(name, value)?;
        if name == "batching" {
            self.batcher.set_batching(value);
            if value {
                self.batcher.start();
            }
        }
        tracing::info!(feature = name, enabled = value, "Feature toggled");
        Ok(value)
    }

    /// Bind the standard listener set on `target`, start the timers and
    /// record the init marker. Returns the number of new bindings.
    pub async fn install(&mut self, target: Arc<dyn EventTarget>) -> usize {
        let mut added = 0;
        for (event, handler) in standard_listeners() {
            let options = ListenerOptions {
                capture: true,
                passive: matches!(event, "scroll" | "mousemove" | "dragover"),
            };
            if self.registry.add(Arc::clone(&target), event, handler, options) {
                added += 1;
            }
        }

        let now = Utc::now();
        self.last_scroll.at = now;
        self.mouse.start(now);
        if self.config.features.batching {
            self.batcher.start();
        }

        tracing::info!(
            target_name = target.name(),
            bindings = self.registry.len(),
            instance = %self.instance_id,
            "Pipeline installed"
        );

        let init = EventRecord::at(EventTag::Init, now)
            .with_field("pageUrl", &self.config.page_url)
            .with_field("version", VERSION)
            .with_field("instanceId", self.instance_id);
        self.record(init).await;
        added
    }

    /// Rebase the pipeline clock on `at`.
    ///
    /// Callers that drive [`tick`](Self::tick) with record time instead of
    /// wall time (replays of past sessions) call this with the first record's
    /// timestamp, so debounce deadlines and pointer samples line up with it.
    pub fn start_clock(&mut self, at: DateTime<Utc>) {
        self.last_scroll.at = at;
        if self.mouse.is_running() {
            self.mouse.stop();
            self.mouse.start(at);
        }
    }

    /// Route a producer record.
    pub async fn dispatch(&mut self, record: EventRecord) -> Dispatched {
        if !is_enabled(&self.config.features, record.tag) {
            return Dispatched::Suppressed;
        }

        match record.tag {
            EventTag::Scroll => {
                self.scroll.trigger(record.timestamp);
                self.pending_scroll = Some(record);
                Dispatched::Deferred
            }
            EventTag::Resize => {
                self.resize.trigger(record.timestamp);
                self.pending_resize = Some(record);
                Dispatched::Deferred
            }
            EventTag::MouseMove => {
                if let Some(pos) = pointer(&record) {
                    self.mouse_pos = pos;
                }
                Dispatched::Tracked
            }
            EventTag::HoverEnter | EventTag::HoverLeave => {
                if let Some(subject) = record.subject() {
                    let fresh = if record.tag == EventTag::HoverEnter {
                        self.hovered.insert(subject)
                    } else {
                        self.hovered.remove(&subject)
                    };
                    if !fresh {
                        return Dispatched::Suppressed;
                    }
                }
                self.record(record).await;
                Dispatched::Recorded
            }
            EventTag::Click => {
                let click = pointer(&record).map(|(x, y)| ClickPoint::new(x, y, record.timestamp));
                self.record(record).await;
                if let Some(click) = click.filter(|_| self.config.features.rage_click) {
                    if let Some(signal) = self.rage.on(click) {
                        tracing::info!(count = signal.count, "Rage click detected");
                        self.record_signal(signal.to_record(&self.config.page_url)).await;
                    }
                }
                Dispatched::Recorded
            }
            EventTag::Key => {
                let keystroke = record.subject().map(|s| (s, record.timestamp));
                self.record(record).await;
                if let Some((subject, at)) = keystroke.filter(|_| self.config.features.typing_speed) {
                    if let Some(signal) = self.typing.on(&subject, at) {
                        self.record_signal(signal.to_record(&self.config.page_url)).await;
                    }
                }
                Dispatched::Recorded
            }
            EventTag::BeforeUnload => {
                if let Some(report) = self.batcher.flush_on_teardown() {
                    tracing::debug!(
                        instance = %self.instance_id,
                        events = report.event_count,
                        "Flushed ahead of unload"
                    );
                }
                self.record(record).await;
                Dispatched::Recorded
            }
            _ => {
                self.record(record).await;
                Dispatched::Recorded
            }
        }
    }

    /// Advance the pipeline clock: emit settled scroll and resize records and
    /// take a pointer sample when one is due.
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        if self.scroll.fire_due(now) {
            if let Some(pending) = self.pending_scroll.take() {
                let shaped = self.shape_scroll(pending, now);
                self.record(shaped).await;
            }
        }

        if self.resize.fire_due(now) {
            if let Some(mut pending) = self.pending_resize.take() {
                if let (Some(w), Some(h)) = (
                    pending.nested_number("size", "width"),
                    pending.nested_number("size", "height"),
                ) {
                    self.rage.set_viewport(Viewport::new(w as u32, h as u32));
                }
                pending.timestamp = now;
                self.record(pending).await;
            }
        }

        if self.mouse.due(now) && self.config.features.mouse_sampling {
            let (x, y) = self.mouse_pos;
            let sample = EventRecord::at(EventTag::MouseSample, now)
                .with_action(ActionType::MouseSample)
                .with_field("x", x)
                .with_field("y", y);
            self.stats.record_event();
            self.batcher.enqueue(sample);
        }
    }

    fn shape_scroll(&mut self, mut record: EventRecord, now: DateTime<Utc>) -> EventRecord {
        let x = record
            .nested_number("position", "x")
            .or_else(|| record.number("scrollX"))
            .unwrap_or(self.last_scroll.x);
        let y = record
            .nested_number("position", "y")
            .or_else(|| record.number("scrollY"))
            .unwrap_or(self.last_scroll.y);

        let dx = x - self.last_scroll.x;
        let dy = y - self.last_scroll.y;
        let dt = (now - self.last_scroll.at).num_milliseconds().max(1) as f64;
        let speed = (dx * dx + dy * dy).sqrt() / dt;

        record.timestamp = now;
        record.insert("position", serde_json::json!({ "x": x, "y": y }));
        record.insert("delta", serde_json::json!({ "dx": dx, "dy": dy }));
        record.insert("speedPxPerMs", speed);
        self.last_scroll = ScrollMark { x, y, at: now };
        record
    }

    /// Record path: forward to the collector when enabled, then batch.
    pub async fn record(&self, record: EventRecord) {
        self.stats.record_event();
        if self.config.features.send_to_background {
            self.forward(&record).await;
        }
        self.batcher.enqueue(record);
    }

    async fn record_signal(&self, record: EventRecord) {
        if !is_enabled(&self.config.features, record.tag) {
            return;
        }
        self.stats.record_signal();
        self.record(record).await;
    }

    async fn forward(&self, record: &EventRecord) {
        let Some(ref bridge) = self.bridge else {
            return;
        };
        match bridge.enqueue(record.clone()).await {
            Ok(()) => self.stats.record_forwarded(),
            Err(e) => {
                tracing::warn!(tag = record.tag.label(), error = %e, "ENQUEUE failed");
                self.stats.record_forward_failure();
            }
        }
    }

    /// Cut a batch now.
    pub fn flush(&self, include_payload: bool) -> Option<BatchReport> {
        self.batcher.flush(include_payload)
    }

    /// Unbind everything, stop the timers and flush what is left.
    ///
    /// The closing `[BeforeUnload]` record is only forwarded, since no batch
    /// will be cut after this point. Safe to call more than once.
    pub async fn teardown(&mut self) -> Option<BatchReport> {
        self.registry.remove_all();
        self.batcher.stop();
        self.mouse.stop();
        self.scroll.cancel();
        self.resize.cancel();
        self.pending_scroll = None;
        self.pending_resize = None;

        let report = self.batcher.flush_on_teardown();

        if self.config.features.before_unload && self.config.features.send_to_background {
            let closing = EventRecord::new(EventTag::BeforeUnload)
                .with_field("pageUrl", &self.config.page_url);
            self.stats.record_event();
            self.forward(&closing).await;
        }

        tracing::info!(instance = %self.instance_id, "Pipeline torn down");
        report
    }
}

/// Pointer position of a record, from `clientX`/`clientY` or `x`/`y`.
fn pointer(record: &EventRecord) -> Option<(f64, f64)> {
    let pick = |a: &str, b: &str| record.number(a).or_else(|| record.number(b));
    Some((pick("clientX", "x")?, pick("clientY", "y")?))
}

/// Compact one-line description of a record for console output.
pub fn describe(record: &EventRecord) -> String {
    let fields: Vec<String> = record
        .payload
        .iter()
        .filter(|(_, v)| !matches!(v, Value::Object(_) | Value::Array(_)))
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    format!("{} {}", record.tag, fields.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RegistrationError;
    use chrono::Duration;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct NullTarget;

    impl EventTarget for NullTarget {
        fn name(&self) -> &str {
            "null"
        }

        fn add_listener(
            &self,
            _event: &str,
            _handler: &HandlerId,
            _options: ListenerOptions,
        ) -> Result<(), RegistrationError> {
            Ok(())
        }

        fn remove_listener(
            &self,
            _event: &str,
            _handler: &HandlerId,
            _options: ListenerOptions,
        ) -> Result<(), RegistrationError> {
            Ok(())
        }
    }

    fn click(x: f64, y: f64, at: DateTime<Utc>) -> EventRecord {
        EventRecord::at(EventTag::Click, at)
            .with_action(ActionType::Click)
            .with_field("clientX", x)
            .with_field("clientY", y)
    }

    fn drain_tags(pipeline: &Pipeline) -> Vec<EventTag> {
        let report = pipeline.flush(true).expect("pending records");
        let json = crate::core::decompress(&report.compressed.unwrap()).unwrap();
        let envelope: Value = serde_json::from_str(&json).unwrap();
        envelope["batch"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| serde_json::from_value(r["tag"].clone()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_install_binds_once() {
        let mut pipeline = Pipeline::new(Config::default());
        let target: Arc<dyn EventTarget> = Arc::new(NullTarget);

        let added = pipeline.install(Arc::clone(&target)).await;
        assert_eq!(added, standard_listeners().len());
        assert!(pipeline.registry().contains("offline", &HandlerId::new("on_offline")));
        assert_eq!(pipeline.install(target).await, 0);

        assert_eq!(pipeline.teardown().await.map(|r| r.event_count), Some(2));
        assert!(pipeline.registry().is_empty());
    }

    #[tokio::test]
    async fn test_rage_click_signal_is_recorded() {
        let mut pipeline = Pipeline::new(Config::default());
        let t0 = Utc::now();
        for i in 0..3 {
            pipeline
                .dispatch(click(100.0 + i as f64, 100.0, t0 + Duration::milliseconds(i * 100)))
                .await;
        }
        assert_eq!(
            drain_tags(&pipeline),
            vec![EventTag::Click, EventTag::Click, EventTag::Click, EventTag::RageClick]
        );
        assert_eq!(pipeline.stats().snapshot().signals, 1);
    }

    #[tokio::test]
    async fn test_disabled_detector_records_plain_clicks() {
        let mut config = Config::default();
        config.features.rage_click = false;
        let mut pipeline = Pipeline::new(config);
        let t0 = Utc::now();
        for _ in 0..5 {
            pipeline.dispatch(click(1.0, 1.0, t0)).await;
        }
        assert_eq!(drain_tags(&pipeline).len(), 5);
    }

    #[tokio::test]
    async fn test_typing_cadence_every_tenth_interval() {
        let mut pipeline = Pipeline::new(Config::default());
        let t0 = Utc::now();
        for i in 0..21 {
            let key = EventRecord::at(EventTag::Key, t0 + Duration::milliseconds(i * 120))
                .with_field("element", json!({ "cssPath": "form > input#q" }));
            pipeline.dispatch(key).await;
        }
        let tags = drain_tags(&pipeline);
        let signals = tags.iter().filter(|t| **t == EventTag::TypingSpeed).count();
        assert_eq!(signals, 2);
    }

    #[tokio::test]
    async fn test_feature_gate() {
        let mut pipeline = Pipeline::new(Config::default());
        pipeline.set_feature("copy_cut_paste", false).unwrap();
        assert_eq!(
            pipeline.dispatch(EventRecord::new(EventTag::Paste)).await,
            Dispatched::Suppressed
        );
        assert!(pipeline.set_feature("telepathy", true).is_err());
        assert_eq!(pipeline.pending_batch_count(), 0);
    }

    #[tokio::test]
    async fn test_scroll_is_debounced_with_delta() {
        let mut pipeline = Pipeline::new(Config::default());
        let t0 = Utc::now();
        pipeline.last_scroll.at = t0;

        for (i, y) in [50.0, 120.0, 300.0].iter().enumerate() {
            let scroll = EventRecord::at(EventTag::Scroll, t0 + Duration::milliseconds(i as i64 * 50))
                .with_field("position", json!({ "x": 0.0, "y": y }));
            assert_eq!(pipeline.dispatch(scroll).await, Dispatched::Deferred);
        }

        pipeline.tick(t0 + Duration::milliseconds(250)).await;
        assert_eq!(pipeline.pending_batch_count(), 0);

        let settled = t0 + Duration::milliseconds(300);
        pipeline.tick(settled).await;
        let report = pipeline.flush(true).unwrap();
        let json = crate::core::decompress(&report.compressed.unwrap()).unwrap();
        let envelope: Value = serde_json::from_str(&json).unwrap();
        let scroll = &envelope["batch"][0]["payload"];
        assert_eq!(scroll["delta"]["dy"], 300.0);
        assert_eq!(scroll["speedPxPerMs"], 1.0);
    }

    #[tokio::test]
    async fn test_resize_updates_viewport() {
        let mut pipeline = Pipeline::new(Config::default());
        let t0 = Utc::now();
        let resize = EventRecord::at(EventTag::Resize, t0)
            .with_field("size", json!({ "width": 1280, "height": 720 }));
        pipeline.dispatch(resize).await;
        pipeline.tick(t0 + Duration::milliseconds(200)).await;
        assert_eq!(pipeline.viewport(), Viewport::new(1280, 720));
    }

    #[tokio::test]
    async fn test_mouse_samples_use_last_position() {
        let mut pipeline = Pipeline::new(Config::default());
        let t0 = Utc::now();
        pipeline.mouse.start(t0);

        let moved = EventRecord::at(EventTag::MouseMove, t0).with_field("clientX", 7).with_field("clientY", 9);
        assert_eq!(pipeline.dispatch(moved).await, Dispatched::Tracked);
        pipeline.tick(t0 + Duration::milliseconds(150)).await;

        assert_eq!(drain_tags(&pipeline), vec![EventTag::MouseSample]);
    }

    #[tokio::test]
    async fn test_hover_enter_deduplicated_until_leave() {
        let mut pipeline = Pipeline::new(Config::default());
        let target = json!({ "tag": "A", "cssPath": "nav > a" });
        let enter = EventRecord::new(EventTag::HoverEnter).with_field("target", target.clone());
        let leave = EventRecord::new(EventTag::HoverLeave).with_field("target", target);

        assert_eq!(pipeline.dispatch(enter.clone()).await, Dispatched::Recorded);
        assert_eq!(pipeline.dispatch(enter.clone()).await, Dispatched::Suppressed);
        assert_eq!(pipeline.dispatch(leave.clone()).await, Dispatched::Recorded);
        assert_eq!(pipeline.dispatch(leave).await, Dispatched::Suppressed);
        assert_eq!(pipeline.dispatch(enter).await, Dispatched::Recorded);
    }

    #[tokio::test]
    async fn test_reports_channel_receives_teardown_flush() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = Pipeline::builder(Config::default()).reports(tx).build();
        pipeline.dispatch(EventRecord::new(EventTag::Copy)).await;

        pipeline.teardown().await;
        let report = rx.recv().await.unwrap();
        assert_eq!(report.event_count, 1);
        assert!(pipeline.teardown().await.is_none());
    }

    #[tokio::test]
    async fn test_historical_replay_follows_record_time() {
        crate::logging::init_test();
        let mut pipeline = Pipeline::new(Config::default());
        pipeline.install(Arc::new(NullTarget)).await;
        // drop the init marker
        pipeline.flush(false);

        let t0 = Utc::now() - Duration::days(1);
        pipeline.start_clock(t0);

        let mut clock = t0;
        for i in 0..5 {
            let at = t0 + Duration::milliseconds(i * 20);
            clock = clock.max(at);
            pipeline.tick(clock).await;
            let scroll = EventRecord::at(EventTag::Scroll, at)
                .with_field("position", json!({ "x": 0.0, "y": i * 10 }));
            assert_eq!(pipeline.dispatch(scroll).await, Dispatched::Deferred);
        }
        assert_eq!(pipeline.pending_batch_count(), 0);

        // 150ms after the first record a pointer sample is due
        pipeline.tick(t0 + Duration::milliseconds(150)).await;
        pipeline.tick(t0 + Duration::milliseconds(300)).await;
        let tags = drain_tags(&pipeline);
        assert_eq!(tags.iter().filter(|t| **t == EventTag::Scroll).count(), 1);
        assert!(tags.contains(&EventTag::MouseSample));
        pipeline.teardown().await;
    }

    #[tokio::test]
    async fn test_before_unload_flushes_pending_batch() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = Pipeline::builder(Config::default()).reports(tx).build();
        pipeline.dispatch(EventRecord::new(EventTag::Copy)).await;
        pipeline.dispatch(EventRecord::new(EventTag::Paste)).await;

        let unload = EventRecord::new(EventTag::BeforeUnload);
        assert_eq!(pipeline.dispatch(unload).await, Dispatched::Recorded);

        let report = rx.recv().await.unwrap();
        assert_eq!(report.reason, crate::core::FlushReason::Teardown);
        assert_eq!(report.event_count, 2);
        // the unload record itself waits for the next batch
        assert_eq!(pipeline.pending_batch_count(), 1);
    }

    #[test]
    fn test_describe() {
        let record = EventRecord::new(EventTag::Cut).with_field("pageUrl", "https://example.com");
        assert_eq!(describe(&record), "[CutLogger] pageUrl=\"https://example.com\"");
    }
}
