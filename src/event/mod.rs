//! Event records and listener bookkeeping.

pub mod registry;
pub mod types;

pub use registry::{
    EventRegistry, EventTarget, HandlerId, ListenerBinding, ListenerOptions, RegistrationError,
};
pub use types::{
    safe_stringify, sanitize_value, ActionType, EventRecord, EventTag, CIRCULAR_MARKER,
    UNSERIALIZABLE_MARKER,
};
