//! Deduplicated listener bookkeeping.
//!
//! Every binding the pipeline installs goes through [`EventRegistry`], which
//! guarantees that one handler is bound to one event name at most once and
//! can tear everything down in one call.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Identity of a handler. Two bindings with the same event name and handler
/// identity are the same binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerId(String);

impl HandlerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options passed through to the target when binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Bind during the capture phase
    pub capture: bool,
    /// Listener never blocks default handling
    pub passive: bool,
}

impl ListenerOptions {
    pub fn capture() -> Self {
        Self {
            capture: true,
            passive: false,
        }
    }
}

/// Error reported by a target when binding or unbinding fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("listener registration failed: {0}")]
pub struct RegistrationError(pub String);

/// Something listeners can be attached to.
pub trait EventTarget: Send + Sync {
    /// Human-readable name of the target, for logs.
    fn name(&self) -> &str;

    fn add_listener(
        &self,
        event: &str,
        handler: &HandlerId,
        options: ListenerOptions,
    ) -> Result<(), RegistrationError>;

    fn remove_listener(
        &self,
        event: &str,
        handler: &HandlerId,
        options: ListenerOptions,
    ) -> Result<(), RegistrationError>;
}

/// A tracked binding.
#[derive(Clone)]
pub struct ListenerBinding {
    pub target: Arc<dyn EventTarget>,
    pub event: String,
    pub handler: HandlerId,
    pub options: ListenerOptions,
}

impl std::fmt::Debug for ListenerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerBinding")
            .field("target", &self.target.name())
            .field("event", &self.event)
            .field("handler", &self.handler)
            .field("options", &self.options)
            .finish()
    }
}

/// Registry enforcing one binding per (event name, handler).
#[derive(Debug, Default)]
pub struct EventRegistry {
    bindings: HashMap<(String, HandlerId), ListenerBinding>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `event` on `target`.
    ///
    /// Returns `false` if the same handler is already bound to that event.
    /// A failing target is logged and otherwise ignored, so one bad binding
    /// does not stop the rest from being installed.
    pub fn add(
        &mut self,
        target: Arc<dyn EventTarget>,
        event: &str,
        handler: HandlerId,
        options: ListenerOptions,
    ) -> bool {
        let key = (event.to_string(), handler.clone());
        if self.bindings.contains_key(&key) {
            return false;
        }

        if let Err(e) = target.add_listener(event, &handler, options) {
            tracing::debug!(
                target_name = target.name(),
                event,
                handler = %handler,
                error = %e,
                "Ignoring listener registration failure"
            );
        }

        self.bindings.insert(
            key,
            ListenerBinding {
                target,
                event: event.to_string(),
                handler,
                options,
            },
        );
        true
    }

    /// Unbind every tracked listener. Safe to call repeatedly.
    pub fn remove_all(&mut self) {
        for (_, binding) in self.bindings.drain() {
            if let Err(e) =
                binding
                    .target
                    .remove_listener(&binding.event, &binding.handler, binding.options)
            {
                tracing::debug!(
                    event = %binding.event,
                    handler = %binding.handler,
                    error = %e,
                    "Ignoring listener removal failure"
                );
            }
        }
    }

    /// Whether `handler` is bound to `event`.
    pub fn contains(&self, event: &str, handler: &HandlerId) -> bool {
        self.bindings
            .contains_key(&(event.to_string(), handler.clone()))
    }

    /// Number of tracked bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Tracked bindings, in no particular order.
    pub fn bindings(&self) -> impl Iterator<Item = &ListenerBinding> {
        self.bindings.values()
    }
}
