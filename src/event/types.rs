//! Shaped interaction records flowing through the pipeline.
//!
//! Producers hand over records that are already shaped (element paths,
//! modifiers and so on are computed upstream). The tag set is closed and its
//! wire labels are a stable contract for downstream consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Marker substituted for values nested beyond [`MAX_PAYLOAD_DEPTH`].
pub const CIRCULAR_MARKER: &str = "[Circular]";

/// Placeholder for values that fail to serialize.
pub const UNSERIALIZABLE_MARKER: &str = "[UNSERIALIZABLE]";

/// Deepest payload nesting kept verbatim.
pub const MAX_PAYLOAD_DEPTH: usize = 64;

/// Kind of a record. Serialized as its bracketed console label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTag {
    #[serde(rename = "[ClickLogger]")]
    Click,
    #[serde(rename = "[KeyLogger]")]
    Key,
    #[serde(rename = "[InputLogger]")]
    Input,
    #[serde(rename = "[ChangeLogger]")]
    Change,
    #[serde(rename = "[SelectionLogger]")]
    Selection,
    #[serde(rename = "[FocusLogger]")]
    Focus,
    #[serde(rename = "[BlurLogger]")]
    Blur,
    #[serde(rename = "[CopyLogger]")]
    Copy,
    #[serde(rename = "[CutLogger]")]
    Cut,
    #[serde(rename = "[PasteLogger]")]
    Paste,
    #[serde(rename = "[ScrollLogger]")]
    Scroll,
    #[serde(rename = "[HoverEnter]")]
    HoverEnter,
    #[serde(rename = "[HoverLeave]")]
    HoverLeave,
    #[serde(rename = "[MouseMove]")]
    MouseMove,
    #[serde(rename = "[MouseSample]")]
    MouseSample,
    #[serde(rename = "[ResizeLogger]")]
    Resize,
    #[serde(rename = "[OrientationLogger]")]
    Orientation,
    #[serde(rename = "[NetworkStatus]")]
    NetworkStatus,
    #[serde(rename = "[BeforeUnload]")]
    BeforeUnload,
    #[serde(rename = "[VisibilityLogger]")]
    Visibility,
    #[serde(rename = "[PageHide]")]
    PageHide,
    #[serde(rename = "[FormSubmitLogger]")]
    FormSubmit,
    #[serde(rename = "[DragStart]")]
    DragStart,
    #[serde(rename = "[DragOver]")]
    DragOver,
    #[serde(rename = "[Drop]")]
    Drop,
    #[serde(rename = "[RageClick]")]
    RageClick,
    #[serde(rename = "[TypingSpeed]")]
    TypingSpeed,
    #[serde(rename = "[BatchLogger]")]
    Batch,
    #[serde(rename = "[ContentLoggerInit]")]
    Init,
}

impl EventTag {
    /// Tags a producer may emit, i.e. everything bound to a document event.
    pub const INTERACTIONS: [EventTag; 24] = [
        EventTag::Click,
        EventTag::Key,
        EventTag::Input,
        EventTag::Change,
        EventTag::Selection,
        EventTag::Focus,
        EventTag::Blur,
        EventTag::Copy,
        EventTag::Cut,
        EventTag::Paste,
        EventTag::Scroll,
        EventTag::HoverEnter,
        EventTag::HoverLeave,
        EventTag::MouseMove,
        EventTag::Resize,
        EventTag::Orientation,
        EventTag::NetworkStatus,
        EventTag::BeforeUnload,
        EventTag::Visibility,
        EventTag::PageHide,
        EventTag::FormSubmit,
        EventTag::DragStart,
        EventTag::DragOver,
        EventTag::Drop,
    ];

    /// Stable console label, e.g. `[ClickLogger]`.
    pub fn label(self) -> &'static str {
        match self {
            EventTag::Click => "[ClickLogger]",
            EventTag::Key => "[KeyLogger]",
            EventTag::Input => "[InputLogger]",
            EventTag::Change => "[ChangeLogger]",
            EventTag::Selection => "[SelectionLogger]",
            EventTag::Focus => "[FocusLogger]",
            EventTag::Blur => "[BlurLogger]",
            EventTag::Copy => "[CopyLogger]",
            EventTag::Cut => "[CutLogger]",
            EventTag::Paste => "[PasteLogger]",
            EventTag::Scroll => "[ScrollLogger]",
            EventTag::HoverEnter => "[HoverEnter]",
            EventTag::HoverLeave => "[HoverLeave]",
            EventTag::MouseMove => "[MouseMove]",
            EventTag::MouseSample => "[MouseSample]",
            EventTag::Resize => "[ResizeLogger]",
            EventTag::Orientation => "[OrientationLogger]",
            EventTag::NetworkStatus => "[NetworkStatus]",
            EventTag::BeforeUnload => "[BeforeUnload]",
            EventTag::Visibility => "[VisibilityLogger]",
            EventTag::PageHide => "[PageHide]",
            EventTag::FormSubmit => "[FormSubmitLogger]",
            EventTag::DragStart => "[DragStart]",
            EventTag::DragOver => "[DragOver]",
            EventTag::Drop => "[Drop]",
            EventTag::RageClick => "[RageClick]",
            EventTag::TypingSpeed => "[TypingSpeed]",
            EventTag::Batch => "[BatchLogger]",
            EventTag::Init => "[ContentLoggerInit]",
        }
    }

    /// Document event name a listener binds for this tag.
    ///
    /// Derived and pipeline-internal tags have none.
    pub fn dom_event(self) -> Option<&'static str> {
        let name = match self {
            EventTag::Click => "click",
            EventTag::Key => "keydown",
            EventTag::Input => "input",
            EventTag::Change => "change",
            EventTag::Selection => "selectionchange",
            EventTag::Focus => "focus",
            EventTag::Blur => "blur",
            EventTag::Copy => "copy",
            EventTag::Cut => "cut",
            EventTag::Paste => "paste",
            EventTag::Scroll => "scroll",
            EventTag::HoverEnter => "mouseover",
            EventTag::HoverLeave => "mouseout",
            EventTag::MouseMove => "mousemove",
            EventTag::Resize => "resize",
            EventTag::Orientation => "orientationchange",
            EventTag::NetworkStatus => "online",
            EventTag::BeforeUnload => "beforeunload",
            EventTag::Visibility => "visibilitychange",
            EventTag::PageHide => "pagehide",
            EventTag::FormSubmit => "submit",
            EventTag::DragStart => "dragstart",
            EventTag::DragOver => "dragover",
            EventTag::Drop => "drop",
            EventTag::MouseSample
            | EventTag::RageClick
            | EventTag::TypingSpeed
            | EventTag::Batch
            | EventTag::Init => return None,
        };
        Some(name)
    }
}

impl std::fmt::Display for EventTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What the user did, as far as the producer could tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Click,
    Key,
    Typing,
    Input,
    Change,
    Selection,
    Focus,
    Blur,
    Copy,
    Cut,
    Paste,
    FormSubmit,
    MouseSample,
}

/// A single shaped interaction datum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Kind of record
    pub tag: EventTag,
    /// When the interaction happened
    pub timestamp: DateTime<Utc>,
    /// Producer's classification of the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ActionType>,
    /// Kind-specific fields
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl EventRecord {
    /// Create a record stamped with the current time.
    pub fn new(tag: EventTag) -> Self {
        Self::at(tag, Utc::now())
    }

    /// Create a record with an explicit timestamp.
    pub fn at(tag: EventTag, timestamp: DateTime<Utc>) -> Self {
        Self {
            tag,
            timestamp,
            action_type: None,
            payload: Map::new(),
        }
    }

    /// Set the action type.
    pub fn with_action(mut self, action: ActionType) -> Self {
        self.action_type = Some(action);
        self
    }

    /// Attach an arbitrary field to the payload.
    ///
    /// Values that fail to serialize are stored as [`UNSERIALIZABLE_MARKER`];
    /// overly deep values are cut at [`CIRCULAR_MARKER`].
    pub fn with_field<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// In-place variant of [`with_field`](Self::with_field).
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) {
        let value = match serde_json::to_value(value) {
            Ok(v) => sanitize_value(v),
            Err(_) => Value::String(UNSERIALIZABLE_MARKER.to_string()),
        };
        self.payload.insert(key.into(), value);
    }

    /// Numeric payload field.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(Value::as_f64)
    }

    /// Numeric field nested one level down, e.g. `position.x`.
    pub fn nested_number(&self, outer: &str, inner: &str) -> Option<f64> {
        self.payload
            .get(outer)
            .and_then(|v| v.get(inner))
            .and_then(Value::as_f64)
    }

    /// Identity of the element a record refers to, used to key per-element
    /// state such as typing cadence.
    pub fn subject(&self) -> Option<String> {
        if let Some(s) = self.payload.get("subject").and_then(Value::as_str) {
            return Some(s.to_string());
        }
        ["element", "target"].iter().find_map(|outer| {
            let obj = self.payload.get(*outer)?;
            ["cssPath", "id", "name"]
                .iter()
                .filter_map(|k| obj.get(*k).and_then(Value::as_str))
                .find(|s| !s.is_empty())
                .map(str::to_string)
        })
    }

    /// Serialize to JSON text; never fails.
    pub fn to_json(&self) -> String {
        safe_stringify(self)
    }
}

/// Serialize any value to JSON text, degrading instead of failing.
///
/// Deep nesting is cut at [`CIRCULAR_MARKER`]; a value that cannot be
/// serialized at all becomes the quoted [`UNSERIALIZABLE_MARKER`].
pub fn safe_stringify<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(v) => serde_json::to_string(&sanitize_value(v))
            .unwrap_or_else(|_| format!("\"{UNSERIALIZABLE_MARKER}\"")),
        Err(e) => {
            tracing::warn!(error = %e, "Payload could not be serialized");
            format!("\"{UNSERIALIZABLE_MARKER}\"")
        }
    }
}

/// Replace everything nested deeper than [`MAX_PAYLOAD_DEPTH`] with the
/// circular-reference marker.
pub fn sanitize_value(value: Value) -> Value {
    sanitize_at(value, 0)
}

fn sanitize_at(value: Value, depth: usize) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) if depth >= MAX_PAYLOAD_DEPTH => {
            Value::String(CIRCULAR_MARKER.to_string())
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| sanitize_at(v, depth + 1))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, sanitize_at(v, depth + 1)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use serde_json::json;
    use std::collections::HashMap;

    struct Broken;

    impl Serialize for Broken {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refuses to serialize"))
        }
    }

    #[test]
    fn test_tag_serializes_as_label() {
        let value = serde_json::to_value(EventTag::RageClick).unwrap();
        assert_eq!(value, json!("[RageClick]"));
        for tag in EventTag::INTERACTIONS {
            assert_eq!(serde_json::to_value(tag).unwrap(), json!(tag.label()));
            assert!(tag.dom_event().is_some(), "{tag} has no event binding");
        }
        assert_eq!(EventTag::Batch.dom_event(), None);
    }

    #[test]
    fn test_record_wire_shape() {
        let record = EventRecord::new(EventTag::Click)
            .with_action(ActionType::Click)
            .with_field("clientX", 10)
            .with_field("clientY", 20);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["tag"], "[ClickLogger]");
        assert_eq!(value["actionType"], "click");
        assert_eq!(value["payload"]["clientX"], 10);

        let back: EventRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_unserializable_field_is_replaced() {
        let mut bad_keys = HashMap::new();
        bad_keys.insert(vec![1u8], "value");
        let record = EventRecord::new(EventTag::Input)
            .with_field("broken", Broken)
            .with_field("bad_keys", bad_keys);
        assert_eq!(record.payload["broken"], json!(UNSERIALIZABLE_MARKER));
        assert_eq!(record.payload["bad_keys"], json!(UNSERIALIZABLE_MARKER));
        assert!(record.to_json().contains(UNSERIALIZABLE_MARKER));
    }

    #[test]
    fn test_deep_nesting_is_cut() {
        let mut value = json!("leaf");
        for _ in 0..(MAX_PAYLOAD_DEPTH + 10) {
            value = json!({ "next": value });
        }
        let record = EventRecord::new(EventTag::Drop).with_field("chain", value);
        let text = record.to_json();
        assert!(text.contains(CIRCULAR_MARKER));
        assert!(!text.contains("leaf"));
    }

    #[test]
    fn test_subject_resolution() {
        let explicit = EventRecord::new(EventTag::Key).with_field("subject", "editor");
        assert_eq!(explicit.subject().as_deref(), Some("editor"));

        let nested = EventRecord::new(EventTag::Key)
            .with_field("element", json!({ "id": "", "name": "email" }));
        assert_eq!(nested.subject().as_deref(), Some("email"));

        assert_eq!(EventRecord::new(EventTag::Key).subject(), None);
    }
}
