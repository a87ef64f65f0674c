//! The `configurable` trait.
//!
//! Merges an instance's `defaults` with `data-*` attributes taken from its
//! `element` property. Attribute names lose the `data-` prefix and are turned
//! from kebab-case into snake_case; only keys already present in the defaults
//! are read unless the trait is requested with `{"accept_all": true}`.
//!
//! Grafted members: `config`, `accept_all_data_configs`, `get_config`,
//! `set_config`, `refresh_config`.
use serde_json::{json, Map, Number, Value};

use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::instance::PluginInstance;
use crate::plugin_system::member::Member;
use crate::plugin_system::traits::TraitDescriptor;

pub const NAME: &str = "configurable";

const DATA_PREFIX: &str = "data-";

/// Attribute bag standing in for the element a plugin is bound to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    attributes: Map<String, Value>,
}

impl Element {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), Value::String(value.to_string()));
        self
    }
}

impl From<Element> for Value {
    fn from(element: Element) -> Self {
        Value::Object(element.attributes)
    }
}

pub fn descriptor() -> TraitDescriptor {
    TraitDescriptor::builder(NAME)
        .property("config", json!({}))
        .property("accept_all_data_configs", Value::Bool(false))
        .method("get_config", get_config)
        .method("set_config", set_config)
        .method("refresh_config", |this, _args| {
            parse_config(this)?;
            Ok(Value::Null)
        })
        .construct(construct)
        .build()
}

fn construct(this: &PluginInstance, args: &[Value]) -> Result<Value> {
    let accept_all = args
        .first()
        .and_then(|options| options.get("accept_all"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if accept_all {
        this.set("accept_all_data_configs", Value::Bool(true));
    }
    parse_config(this)?;
    Ok(Value::Null)
}

fn invalid(this: &PluginInstance, message: &str) -> PluginSystemError {
    PluginSystemError::InvalidConfiguration {
        plugin: this.plugin_name().to_string(),
        message: message.to_string(),
    }
}

fn defaults(this: &PluginInstance) -> Result<Map<String, Value>> {
    let value = match this.member("defaults") {
        Some(Member::Method(method)) => method(this, &[])?,
        Some(Member::Property(value)) => value,
        _ => Value::Null,
    };
    Ok(match value {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

fn parse_config(this: &PluginInstance) -> Result<()> {
    let element = match this.get("element") {
        Some(Value::Object(attributes)) => attributes,
        _ => {
            return Err(invalid(
                this,
                "data configuration can only be extracted from an element",
            ))
        }
    };
    let accept_all = this
        .get("accept_all_data_configs")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let mut config = defaults(this)?;
    for (attribute, raw) in &element {
        let Some(name) = attribute.strip_prefix(DATA_PREFIX) else {
            continue;
        };
        let key = name.replace('-', "_");
        if accept_all || config.contains_key(&key) {
            config.insert(key, coerce(raw));
        }
    }
    this.set("config", Value::Object(config));
    Ok(())
}

/// Turn an attribute string into the value it most likely means.
pub fn coerce(raw: &Value) -> Value {
    let Value::String(text) = raw else {
        return raw.clone();
    };
    let trimmed = text.trim();
    match trimmed.to_lowercase().as_str() {
        "" | "true" | "yes" => return Value::Bool(true),
        "false" | "no" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Value::Number(integer.into());
    }
    if let Some(number) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
            return parsed;
        }
    }
    Value::String(text.clone())
}

fn get_config(this: &PluginInstance, args: &[Value]) -> Result<Value> {
    let config = this.get("config").unwrap_or_else(|| json!({}));
    match args.first().and_then(Value::as_str) {
        Some(key) => Ok(config.get(key).cloned().unwrap_or(Value::Null)),
        None => Ok(config),
    }
}

fn set_config(this: &PluginInstance, args: &[Value]) -> Result<Value> {
    let key = args
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(this, "set_config expects a key"))?;
    let value = args.get(1).cloned().unwrap_or(Value::Null);
    let mut config = match this.get("config") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    config.insert(key.to_string(), value);
    this.set("config", Value::Object(config));
    Ok(Value::Null)
}
