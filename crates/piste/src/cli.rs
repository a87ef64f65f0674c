use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use piste_core::plugin_system::compose::collect_trait_requests;
use piste_core::plugin_system::Result;
use piste_core::{PluginInstance, Registry, Resolved};
use serde_json::{json, Value};

/// Piste: a plugin registry host
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Simple ping command for testing
    #[arg(long)]
    pub ping: bool,

    /// Registry configuration file (.json, .toml, .yaml)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Enable registry debug output
    #[arg(long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect registered plugins
    Plugins {
        #[command(subcommand)]
        command: PluginsCommand,
    },
    /// Resolve a plugin by name and print the result
    Resolve {
        /// Plugin name
        name: String,
        /// Arguments, parsed as JSON where possible
        args: Vec<String>,
    },
    /// Call a plugin method without keeping an instance
    Call {
        /// Plugin name
        name: String,
        /// Method name
        method: String,
        /// Arguments, parsed as JSON where possible
        args: Vec<String>,
    },
    /// Fire a global event
    Event {
        /// Event name
        name: String,
        /// Arguments, parsed as JSON where possible
        args: Vec<String>,
        /// Wait for asynchronous listeners
        #[arg(long)]
        promise: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum PluginsCommand {
    /// List registered plugins
    List {},
    /// Show details of one plugin
    Show {
        /// The name of the plugin
        name: String,
    },
}

/// Read a command-line argument as JSON, falling back to a plain string.
pub fn parse_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn parse_args(raw: &[String]) -> Vec<Value> {
    raw.iter().map(|arg| parse_arg(arg)).collect()
}

fn describe_instance(instance: &PluginInstance) -> Value {
    json!({
        "plugin": instance.plugin_name(),
        "id": instance.id(),
        "properties": instance.properties(),
    })
}

pub fn list_plugins(registry: &Registry) {
    let loaders = registry.get_plugins();
    if loaders.is_empty() {
        println!("No plugins registered.");
        return;
    }
    for loader in loaders {
        let kind = if loader.is_function() {
            "function"
        } else if loader.is_singleton() {
            "singleton"
        } else {
            "class"
        };
        println!("{} ({})", loader.name(), kind);
    }
}

pub fn show_plugin(registry: &Registry, name: &str) -> Result<()> {
    let loader = registry.get_plugin(name)?;
    let mut details = json!({
        "name": loader.name(),
        "function": loader.is_function(),
        "singleton": loader.is_singleton(),
        "dependencies": loader.get_dependencies(),
        "unmet_dependencies": loader.unmet_dependencies(),
        "instances": loader.instance_count(),
    });
    if let Some(class) = loader.factory().as_class() {
        let mut methods: Vec<String> = class
            .collect_members()
            .into_iter()
            .filter(|(_, member)| member.is_callable())
            .map(|(name, _)| name)
            .collect();
        methods.sort();
        let traits: Vec<String> = collect_trait_requests(class)
            .into_iter()
            .map(|request| request.name)
            .collect();
        details["class"] = json!(class.name());
        details["methods"] = json!(methods);
        details["traits"] = json!(traits);
    }
    print_json(&details);
    Ok(())
}

pub fn resolve(registry: &Arc<Registry>, name: &str, args: &[Value]) -> Result<()> {
    match registry.mediator().get(name, args)? {
        Resolved::Instance(instance) => print_json(&describe_instance(&instance)),
        Resolved::Value(value) => print_json(&value),
    }
    Ok(())
}

pub fn call(registry: &Registry, name: &str, method: &str, args: &[Value]) -> Result<()> {
    let value = registry.get_plugin(name)?.call_method(method, args)?;
    print_json(&value);
    Ok(())
}

pub async fn event(registry: &Registry, name: &str, args: Vec<Value>, promise: bool) -> Result<()> {
    if promise {
        registry.global_promise_event(name, args).await?;
        println!("Event \"{}\" resolved", name);
    } else if registry.global_event(name, &args) {
        println!("Event \"{}\" completed", name);
    } else {
        println!("Event \"{}\" stopped", name);
    }
    Ok(())
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", value),
    }
}
