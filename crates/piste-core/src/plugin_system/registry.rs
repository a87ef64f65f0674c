//! # Plugin Registry
//!
//! The [`Registry`] owns one [`PluginLoader`] per registered name and the
//! table of trait descriptors. It runs the bootstrap sequence (built-in
//! traits, utility plugins, singletons, the `ready` event) and dispatches
//! global events to every live instance that listens for them.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::future::{self, BoxFuture};
use parking_lot::RwLock;
use serde_json::Value;

use crate::abstracts;
use crate::config::RegistryConfig;
use crate::event::{is_stop, READY_EVENT};
use crate::plugin_system::class::Factory;
use crate::plugin_system::compose::collect_trait_requests;
use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::loader::PluginLoader;
use crate::plugin_system::mediator::{Mediator, RegistryMember};
use crate::plugin_system::traits::TraitDescriptor;

/// Registry for plugins and traits
pub struct Registry {
    this: Weak<Registry>,
    config: RegistryConfig,
    /// Loaders keyed by lower-cased plugin name
    plugins: RwLock<HashMap<String, Arc<PluginLoader>>>,
    /// Trait descriptors keyed by lower-cased trait name
    traits: RwLock<HashMap<String, Arc<TraitDescriptor>>>,
    /// Utility plugins registered by `load_utilities`
    utilities: Vec<(String, Factory)>,
    bootstrapped: AtomicBool,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("plugins", &self.get_plugin_names())
            .field("traits", &self.traits.read().keys().collect::<Vec<_>>())
            .field("bootstrapped", &self.bootstrapped.load(Ordering::SeqCst))
            .finish()
    }
}

/// Builder for a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    config: RegistryConfig,
    utilities: Vec<(String, Factory)>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn auto_singletons(mut self, auto_singletons: bool) -> Self {
        self.config.auto_singletons = auto_singletons;
        self
    }

    /// Register `factory` as a utility plugin when the registry initialises.
    pub fn utility(mut self, name: &str, factory: impl Into<Factory>) -> Self {
        self.utilities.push((name.to_string(), factory.into()));
        self
    }

    pub fn build(self) -> Arc<Registry> {
        Arc::new_cyclic(|this| Registry {
            this: this.clone(),
            config: self.config,
            plugins: RwLock::new(HashMap::new()),
            traits: RwLock::new(HashMap::new()),
            utilities: self.utilities,
            bootstrapped: AtomicBool::new(false),
        })
    }
}

impl Registry {
    /// Create a registry with the default configuration
    pub fn new() -> Arc<Self> {
        RegistryBuilder::new().build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// External access surface for host code.
    pub fn mediator(self: &Arc<Self>) -> Mediator {
        Mediator::new(self.clone())
    }

    /// Log a registry message when debugging is enabled.
    pub fn debug(&self, message: &str) {
        if self.config.debug {
            log::debug!("{}", message);
        }
    }

    /// Register a plugin, replacing any plugin of the same name.
    ///
    /// A replaced singleton is dropped from the table without being
    /// destructed; tearing it down is the caller's business.
    pub fn register_plugin(&self, name: &str, factory: impl Into<Factory>) -> Result<()> {
        if RegistryMember::from_name(name).is_some() {
            return Err(PluginSystemError::ReservedName { name: name.to_string() });
        }
        let key = name.to_lowercase();
        let loader = PluginLoader::new(&key, factory.into(), self.this.clone());
        if self.plugins.write().insert(key.clone(), loader).is_some() {
            self.debug(&format!("Replaced plugin \"{}\"", key));
        } else {
            self.debug(&format!("Registered plugin \"{}\"", key));
        }
        Ok(())
    }

    /// Register a trait, replacing any trait of the same name.
    pub fn register_trait(&self, name: &str, descriptor: TraitDescriptor) {
        let key = name.to_lowercase();
        self.traits.write().insert(key.clone(), Arc::new(descriptor));
        self.debug(&format!("Registered trait \"{}\"", key));
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.read().contains_key(&name.to_lowercase())
    }

    pub fn has_trait(&self, name: &str) -> bool {
        self.traits.read().contains_key(&name.to_lowercase())
    }

    /// Registered plugin names, sorted.
    pub fn get_plugin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get_plugin(&self, name: &str) -> Result<Arc<PluginLoader>> {
        self.plugins
            .read()
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| PluginSystemError::PluginNotFound { name: name.to_string() })
    }

    /// Loaders in name order.
    pub fn get_plugins(&self) -> Vec<Arc<PluginLoader>> {
        let plugins = self.plugins.read();
        let mut loaders: Vec<Arc<PluginLoader>> = plugins.values().cloned().collect();
        loaders.sort_by(|a, b| a.name().cmp(b.name()));
        loaders
    }

    pub fn get_trait(&self, name: &str) -> Option<Arc<TraitDescriptor>> {
        self.traits.read().get(&name.to_lowercase()).cloned()
    }

    /// Unregister a plugin. Instances already handed out stay alive.
    pub fn remove_plugin(&self, name: &str) -> bool {
        let removed = self.plugins.write().remove(&name.to_lowercase()).is_some();
        if removed {
            self.debug(&format!("Removed plugin \"{}\"", name.to_lowercase()));
        }
        removed
    }

    /// Names of class plugins mapping `event`, through their own listens
    /// tables or through one of their traits.
    pub fn listens_to_event(&self, event: &str) -> Vec<String> {
        self.get_plugins()
            .into_iter()
            .filter(|loader| {
                let Some(class) = loader.factory().as_class() else {
                    return false;
                };
                class.listens_to(event)
                    || collect_trait_requests(class).iter().any(|request| {
                        self.get_trait(&request.name)
                            .map(|descriptor| descriptor.listens_to(event))
                            .unwrap_or(false)
                    })
            })
            .map(|loader| loader.name().to_string())
            .collect()
    }

    /// Register the built-in traits.
    pub fn attach_abstracts(&self) {
        self.register_trait(abstracts::configurable::NAME, abstracts::configurable::descriptor());
        self.register_trait(abstracts::fires_events::NAME, abstracts::fires_events::descriptor());
    }

    /// Register the utility plugins given to the builder, restricted to the
    /// configured list when one is set.
    pub fn load_utilities(&self) -> Result<()> {
        for (name, factory) in &self.utilities {
            let enabled = match &self.config.utilities {
                Some(allowed) => allowed.iter().any(|allowed| allowed.eq_ignore_ascii_case(name)),
                None => true,
            };
            if enabled {
                self.register_plugin(name, factory.clone())?;
            } else {
                self.debug(&format!("Utility \"{}\" disabled by configuration", name));
            }
        }
        Ok(())
    }

    /// One-time bootstrap. Later calls are ignored.
    pub fn initialise(&self) -> Result<()> {
        if self.bootstrapped.swap(true, Ordering::SeqCst) {
            log::warn!("Registry already initialised, skipping");
            return Ok(());
        }
        self.attach_abstracts();
        self.load_utilities()?;
        self.debug("Registry initialised");
        Ok(())
    }

    /// Build every singleton whose dependencies are registered. Every
    /// singleton is attempted; the first failure is returned.
    pub fn init_singletons(&self) -> Result<()> {
        let mut first_error = None;
        for loader in self.get_plugins() {
            if !loader.is_singleton() || !loader.dependencies_fulfilled() {
                continue;
            }
            if let Err(e) = loader.initialise_singleton(&[]) {
                log::error!("Failed to initialise singleton \"{}\": {}", loader.name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Page-ready hook for host code: build singletons if configured, then
    /// fire the global `ready` event. The event fires even when a singleton
    /// failed to build; that failure is returned afterwards. `Ok(false)`
    /// means a listener stopped the event.
    pub fn ready(&self) -> Result<bool> {
        let singletons = if self.config.auto_singletons {
            self.init_singletons()
        } else {
            Ok(())
        };
        let completed = self.global_event(READY_EVENT, &[]);
        singletons.map(|()| completed)
    }

    /// Dispatch a global event to every listening instance. Returns `false`
    /// when a listener returned the stop value.
    pub fn global_event(&self, event: &str, args: &[Value]) -> bool {
        self.debug(&format!("Calling global event \"{}\"", event));
        let listeners = self.listens_to_event(event);
        if listeners.is_empty() {
            self.debug(&format!("No listeners found for global event \"{}\"", event));
            return true;
        }

        for name in listeners {
            let Ok(loader) = self.get_plugin(&name) else {
                continue;
            };
            for instance in loader.get_instances() {
                match instance.handle_global_event(event, args) {
                    Ok(value) if is_stop(&value) => {
                        self.debug(&format!("Global event \"{}\" cancelled by \"{}\"", event, name));
                        return false;
                    }
                    Ok(_) => {}
                    Err(e) => log::error!("Listener \"{}\" failed on event \"{}\": {}", name, event, e),
                }
            }
        }
        true
    }

    /// Dispatch a global event and wait for every listener to settle. The
    /// first failing listener rejects the whole event.
    pub async fn global_promise_event(&self, event: &str, args: Vec<Value>) -> Result<()> {
        self.debug(&format!("Calling global promise event \"{}\"", event));
        let mut pending: Vec<BoxFuture<'static, Result<Value>>> = Vec::new();
        for name in self.listens_to_event(event) {
            let Ok(loader) = self.get_plugin(&name) else {
                continue;
            };
            for instance in loader.get_instances() {
                let event_name = event.to_string();
                let plugin = name.clone();
                let listener = instance.handle_global_promise_event(event, args.clone());
                pending.push(Box::pin(async move {
                    listener.await.map_err(|source| PluginSystemError::ListenerFailed {
                        event: event_name,
                        plugin,
                        source: Box::new(source),
                    })
                }));
            }
        }
        future::try_join_all(pending).await?;
        Ok(())
    }
}
