//! # Piste Events
//!
//! Two layers of events exist. Global events are dispatched by the
//! [`Registry`](crate::plugin_system::Registry) to every live instance whose
//! plugin maps the event name in its `listens` table. Local events live on a
//! single instance ([`LocalEvents`]) and, when the plugin declares an event
//! prefix, are forwarded as `"{prefix}.{event}"` global events once every
//! local handler has run.
//!
//! Returning `false` from a synchronous handler is the stop signal: remaining
//! handlers are skipped and nothing is forwarded.
pub mod local;

use serde_json::Value;

/// Type for local handler identifiers
pub type HandlerId = u64;

/// Fired by [`Registry::ready`](crate::plugin_system::Registry::ready).
pub const READY_EVENT: &str = "ready";

pub use local::{EventCallback, LocalEvents, PromiseCallback};

/// Whether a handler result stops propagation.
pub fn is_stop(value: &Value) -> bool {
    matches!(value, Value::Bool(false))
}

/// Name a local event is forwarded under.
pub fn global_name(prefix: &str, event: &str) -> String {
    format!("{}.{}", prefix, event)
}

// Test module declaration
#[cfg(test)]
mod tests;
