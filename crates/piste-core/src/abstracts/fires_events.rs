//! The `fires_events` trait.
//!
//! Exposes an instance's local events through dynamic members. Requesting
//! the trait with `{"prefix": "..."}` sets the prefix local events are
//! forwarded under, unless the instance or its class already defines one.
use serde_json::Value;

use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::instance::PluginInstance;
use crate::plugin_system::traits::TraitDescriptor;

pub const NAME: &str = "fires_events";

pub fn descriptor() -> TraitDescriptor {
    TraitDescriptor::builder(NAME)
        .method("get_event_prefix", |this, _args| {
            Ok(this.event_prefix().map(Value::String).unwrap_or(Value::Null))
        })
        .method("trigger_event", trigger_event)
        .construct(construct)
        .build()
}

fn construct(this: &PluginInstance, args: &[Value]) -> Result<Value> {
    let prefix = args
        .first()
        .and_then(|options| options.get("prefix"))
        .and_then(Value::as_str);
    if let Some(prefix) = prefix {
        if this.event_prefix().is_none() {
            this.set("event_prefix", Value::String(prefix.to_string()));
        }
    }
    Ok(Value::Null)
}

/// `trigger_event(name, ...args)`, returning whether the event ran to
/// completion.
fn trigger_event(this: &PluginInstance, args: &[Value]) -> Result<Value> {
    let (name, rest) = match args.split_first() {
        Some((Value::String(name), rest)) => (name, rest),
        _ => {
            return Err(PluginSystemError::operation(
                this.plugin_name(),
                "trigger_event expects an event name",
            ))
        }
    };
    Ok(Value::Bool(this.trigger_event(name, rest)))
}
