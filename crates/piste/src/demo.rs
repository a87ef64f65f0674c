//! Plugins bundled with the `piste` binary.
use piste_core::plugin_system::{PluginSystemError, Result, TraitRequest};
use piste_core::{Factory, InnerMediator, PluginClass, Registry};
use serde_json::{json, Value};

/// Utility plugins, registered by `Registry::initialise`.
pub fn utilities() -> Vec<(&'static str, Factory)> {
    vec![("slug", Factory::function(slug))]
}

fn slug(_registry: &InnerMediator, args: &[Value]) -> Result<Value> {
    let text = args.first().and_then(Value::as_str).unwrap_or_default();
    let slug = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    Ok(Value::String(slug))
}

/// Register the demo plugins.
pub fn register(registry: &Registry) -> Result<()> {
    registry.register_plugin("modal", modal())?;
    registry.register_plugin("alert", alert())?;
    registry.register_plugin("widget", widget())?;
    Ok(())
}

fn modal() -> PluginClass {
    PluginClass::builder("Modal")
        .property("title", json!("Dialog"))
        .property("open", json!(false))
        .construct(|this, args| {
            if let Some(Value::String(title)) = args.first() {
                this.set("title", json!(title));
            }
            Ok(Value::Null)
        })
        .method("show", |this, _args| {
            this.set("open", json!(true));
            Ok(this.get("title").unwrap_or(Value::Null))
        })
        .build()
}

fn alert() -> PluginClass {
    PluginClass::builder("Alert")
        .singleton(true)
        .dependencies(["modal"])
        .traits(vec![TraitRequest::with_config("fires_events", json!({ "prefix": "alert" }))])
        .property("ready", json!(false))
        .method("on_ready", |this, _args| {
            this.set("ready", json!(true));
            this.registry().debug("alert is ready");
            Ok(Value::Null)
        })
        .method("show", |this, args| {
            let message = args.first().cloned().unwrap_or_else(|| json!("Alert"));
            let modal = this
                .registry()
                .get("modal", &[message.clone()])?
                .into_instance()
                .ok_or_else(|| PluginSystemError::operation(this.plugin_name(), "modal is not a class plugin"))?;
            let shown = modal.call("show", &[])?;
            this.trigger_event("shown", &[shown.clone()]);
            Ok(shown)
        })
        .listens("ready", "on_ready")
        .build()
}

fn widget() -> PluginClass {
    PluginClass::builder("Widget")
        .traits(["configurable"])
        .property("defaults", json!({ "size": 10, "visible": true }))
        .construct(|this, args| {
            // Without an element the configurable trait refuses to build.
            if let Some(element @ Value::Object(_)) = args.first() {
                this.set("element", element.clone());
            }
            Ok(Value::Null)
        })
        .build()
}
