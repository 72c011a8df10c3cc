//! Rage-click detection.
//!
//! Clicks are kept in a short time window. When enough of them land close to
//! the newest click, a single signal is raised and the window is cleared so
//! the same cluster is not reported twice.

use crate::config::RageClickConfig;
use crate::event::{EventRecord, EventTag};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A click position in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClickPoint {
    pub x: f64,
    pub y: f64,
    pub t: DateTime<Utc>,
}

impl ClickPoint {
    pub fn new(x: f64, y: f64, t: DateTime<Utc>) -> Self {
        Self { x, y, t }
    }

    fn distance_to(&self, other: &ClickPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Size of the visible area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    #[serde(rename = "w")]
    pub width: u32,
    #[serde(rename = "h")]
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A detected burst of clicks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RageClickSignal {
    /// The click that completed the cluster
    pub center: ClickPoint,
    /// Clicks within the radius of `center`, including it
    pub count: usize,
    /// Viewport at detection time
    pub viewport: Viewport,
}

impl RageClickSignal {
    /// Shape the signal as a pipeline record.
    pub fn to_record(&self, page_url: &str) -> EventRecord {
        EventRecord::at(EventTag::RageClick, self.center.t)
            .with_field("pageUrl", page_url)
            .with_field(
                "center",
                serde_json::json!({ "x": self.center.x, "y": self.center.y }),
            )
            .with_field("count", self.count)
            .with_field("windowSize", self.viewport)
    }
}

/// Spatio-temporal click clustering.
#[derive(Debug)]
pub struct RageClickDetector {
    threshold: Duration,
    required: usize,
    radius_px: f64,
    window: VecDeque<ClickPoint>,
    viewport: Viewport,
}

impl RageClickDetector {
    pub fn new(config: &RageClickConfig) -> Self {
        Self {
            threshold: Duration::milliseconds(config.threshold_ms),
            required: config.required.max(1),
            radius_px: config.radius_px,
            window: VecDeque::new(),
            viewport: Viewport::default(),
        }
    }

    /// Record the current viewport; it is attached to later signals.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Feed one click. Returns a signal when the click completes a cluster.
    pub fn on(&mut self, click: ClickPoint) -> Option<RageClickSignal> {
        let now = click.t;
        self.window.push_back(click);

        while let Some(oldest) = self.window.front() {
            if now - oldest.t > self.threshold {
                self.window.pop_front();
            } else {
                break;
            }
        }

        let center = *self.window.back()?;
        let count = self
            .window
            .iter()
            .filter(|c| c.distance_to(&center) <= self.radius_px)
            .count();

        if count < self.required {
            return None;
        }

        self.window.clear();
        Some(RageClickSignal {
            center,
            count,
            viewport: self.viewport,
        })
    }

    /// Clicks currently held in the window.
    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> RageClickDetector {
        RageClickDetector::new(&RageClickConfig::default())
    }

    fn click(x: f64, y: f64, base: DateTime<Utc>, offset_ms: i64) -> ClickPoint {
        ClickPoint::new(x, y, base + Duration::milliseconds(offset_ms))
    }

    #[test]
    fn test_three_close_clicks_raise_one_signal() {
        let mut detector = detector();
        detector.set_viewport(Viewport::new(1280, 720));
        let t0 = Utc::now();

        assert!(detector.on(click(100.0, 100.0, t0, 0)).is_none());
        assert!(detector.on(click(105.0, 98.0, t0, 100)).is_none());
        let signal = detector.on(click(102.0, 103.0, t0, 200)).expect("signal");

        assert_eq!(signal.count, 3);
        assert_eq!(signal.center.x, 102.0);
        assert_eq!(signal.viewport, Viewport::new(1280, 720));
        assert_eq!(detector.window_len(), 0);

        // the cluster was consumed; a single follow-up click starts over
        assert!(detector.on(click(101.0, 101.0, t0, 300)).is_none());
        assert_eq!(detector.window_len(), 1);
    }

    #[test]
    fn test_distant_clicks_do_not_cluster() {
        let mut detector = detector();
        let t0 = Utc::now();

        assert!(detector.on(click(0.0, 0.0, t0, 0)).is_none());
        assert!(detector.on(click(200.0, 0.0, t0, 50)).is_none());
        assert!(detector.on(click(400.0, 0.0, t0, 100)).is_none());
        assert_eq!(detector.window_len(), 3);
    }

    #[test]
    fn test_radius_boundary_is_inclusive() {
        let mut detector = detector();
        let t0 = Utc::now();

        detector.on(click(0.0, 0.0, t0, 0));
        detector.on(click(25.0, 0.0, t0, 10));
        // (0,0) is exactly 25px from the center (15,20)
        let signal = detector.on(click(15.0, 20.0, t0, 20));
        assert!(signal.is_some());
    }

    #[test]
    fn test_old_clicks_are_evicted() {
        let mut detector = detector();
        let t0 = Utc::now();

        detector.on(click(10.0, 10.0, t0, 0));
        detector.on(click(10.0, 10.0, t0, 100));
        // 700ms after the first click: the first one falls out
        assert!(detector.on(click(10.0, 10.0, t0, 700)).is_none());
        assert_eq!(detector.window_len(), 2);
    }

    #[test]
    fn test_signal_record_shape() {
        let signal = RageClickSignal {
            center: ClickPoint::new(4.0, 5.0, Utc::now()),
            count: 3,
            viewport: Viewport::new(800, 600),
        };
        let record = signal.to_record("https://example.test/");
        assert_eq!(record.tag, EventTag::RageClick);
        assert_eq!(record.payload["count"], 3);
        assert_eq!(record.payload["windowSize"]["w"], 800);
        assert_eq!(record.payload["center"]["y"], 5.0);
    }
}
