//! Configuration for the behavior pipeline.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the pipeline and its collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How often pending records are flushed into a batch
    #[serde(with = "duration_ms")]
    pub batch_interval: Duration,

    /// How often the last known pointer position is sampled
    #[serde(with = "duration_ms")]
    pub mouse_sample_interval: Duration,

    /// Quiet period before a scroll record is emitted
    #[serde(with = "duration_ms")]
    pub scroll_debounce: Duration,

    /// Quiet period before a resize record is emitted
    #[serde(with = "duration_ms")]
    pub resize_debounce: Duration,

    /// Rage-click clustering parameters
    pub rage_click: RageClickConfig,

    /// Typing cadence parameters
    pub typing: TypingConfig,

    /// Delivery queue parameters
    pub queue: QueueConfig,

    /// Which interaction kinds and pipeline stages are active
    pub features: FeatureFlags,

    /// Path for the persisted queue and stats
    pub data_path: PathBuf,

    /// URL of the instrumented document, attached to derived records
    pub page_url: String,

    /// Default tracing filter
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-behavior-pipeline");

        Self {
            batch_interval: Duration::from_millis(5000),
            mouse_sample_interval: Duration::from_millis(150),
            scroll_debounce: Duration::from_millis(200),
            resize_debounce: Duration::from_millis(200),
            rage_click: RageClickConfig::default(),
            typing: TypingConfig::default(),
            queue: QueueConfig::default(),
            features: FeatureFlags::default(),
            data_path: data_dir,
            page_url: "about:blank".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file, falling back to defaults if it
    /// does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-behavior-pipeline")
            .join("config.json")
    }

    /// Directory holding the persisted queue documents.
    pub fn queue_dir(&self) -> PathBuf {
        self.data_path.join("queue")
    }

    /// File holding persisted pipeline statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(self.queue_dir())?;
        Ok(())
    }
}

/// Rage-click clustering parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RageClickConfig {
    /// Clicks older than this (relative to the newest) leave the window
    pub threshold_ms: i64,
    /// Nearby clicks needed to raise a signal
    pub required: usize,
    /// Euclidean radius around the newest click
    pub radius_px: f64,
}

impl Default for RageClickConfig {
    fn default() -> Self {
        Self {
            threshold_ms: 600,
            required: 3,
            radius_px: 25.0,
        }
    }
}

/// Typing cadence parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingConfig {
    /// Rolling interval list length per subject
    pub max_intervals: usize,
    /// Emit a cadence signal every N recorded intervals
    pub report_every: u64,
    /// Subjects tracked at once; the least recently seen is evicted beyond this
    pub max_subjects: usize,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            max_intervals: 40,
            report_every: 10,
            max_subjects: 1024,
        }
    }
}

/// Delivery queue parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Storage key holding the queue
    pub key: String,
    /// Capacity; the oldest items are dropped beyond it
    pub max_items: usize,
    /// Items echoed back by FLUSH_QUEUE
    pub sample_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            key: "ext_v2_event_queue".to_string(),
            max_items: 5000,
            sample_size: 20,
        }
    }
}

/// Toggles for each interaction kind and pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub click: bool,
    pub keydown: bool,
    pub input: bool,
    pub change: bool,
    pub focus_blur: bool,
    pub selection: bool,
    pub copy_cut_paste: bool,
    pub scroll: bool,
    pub hover: bool,
    pub mouse_sampling: bool,
    pub resize_orientation: bool,
    pub network_status: bool,
    pub before_unload: bool,
    pub form_submit: bool,
    pub drag_drop: bool,
    pub rage_click: bool,
    pub typing_speed: bool,
    pub batching: bool,
    pub send_to_background: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            click: true,
            keydown: true,
            input: true,
            change: true,
            focus_blur: true,
            selection: true,
            copy_cut_paste: true,
            scroll: true,
            hover: true,
            mouse_sampling: true,
            resize_orientation: true,
            network_status: true,
            before_unload: true,
            form_submit: true,
            drag_drop: true,
            rage_click: true,
            typing_speed: true,
            batching: true,
            // off unless a collector is known to be listening
            send_to_background: false,
        }
    }
}

impl FeatureFlags {
    /// All flag names, in declaration order.
    pub const NAMES: [&'static str; 19] = [
        "click",
        "keydown",
        "input",
        "change",
        "focus_blur",
        "selection",
        "copy_cut_paste",
        "scroll",
        "hover",
        "mouse_sampling",
        "resize_orientation",
        "network_status",
        "before_unload",
        "form_submit",
        "drag_drop",
        "rage_click",
        "typing_speed",
        "batching",
        "send_to_background",
    ];

    fn slot(&mut self, name: &str) -> Option<&mut bool> {
        let slot = match name {
            "click" => &mut self.click,
            "keydown" => &mut self.keydown,
            "input" => &mut self.input,
            "change" => &mut self.change,
            "focus_blur" => &mut self.focus_blur,
            "selection" => &mut self.selection,
            "copy_cut_paste" => &mut self.copy_cut_paste,
            "scroll" => &mut self.scroll,
            "hover" => &mut self.hover,
            "mouse_sampling" => &mut self.mouse_sampling,
            "resize_orientation" => &mut self.resize_orientation,
            "network_status" => &mut self.network_status,
            "before_unload" => &mut self.before_unload,
            "form_submit" => &mut self.form_submit,
            "drag_drop" => &mut self.drag_drop,
            "rage_click" => &mut self.rage_click,
            "typing_speed" => &mut self.typing_speed,
            "batching" => &mut self.batching,
            "send_to_background" => &mut self.send_to_background,
            _ => return None,
        };
        Some(slot)
    }

    /// Toggle a feature by name, returning the new value.
    pub fn set(&mut self, name: &str, value: bool) -> Result<bool, ConfigError> {
        let slot = self
            .slot(name)
            .ok_or_else(|| ConfigError::UnknownFeature(name.to_string()))?;
        *slot = value;
        Ok(value)
    }

    /// Read a feature by name.
    pub fn get(&self, name: &str) -> Option<bool> {
        self.clone().slot(name).map(|v| *v)
    }

    /// Parse a comma-separated list of `name=on|off` overrides.
    pub fn apply_csv(&mut self, s: &str) -> Result<(), ConfigError> {
        for item in s.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (name, value) = match item.split_once('=') {
                Some((name, value)) => (name.trim(), value.trim()),
                None => (item, "on"),
            };
            let enabled = matches!(value.to_lowercase().as_str(), "on" | "true" | "1" | "yes");
            self.set(name, enabled)?;
        }
        Ok(())
    }
}

/// Serde support for millisecond durations.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
