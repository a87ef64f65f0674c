//! # Plugin Loader
//!
//! One [`PluginLoader`] exists per registered plugin name. It owns the live
//! instances of that plugin, checks dependencies before constructing
//! anything, enforces the singleton lifecycle, composes traits and keeps the
//! table of test mocks.
//!
//! Construction order for a new instance is fixed: attach the detach hook,
//! run `construct` with the caller's arguments, compose traits, run `init`,
//! record the instance as live, then layer any active mocks over it.
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use serde_json::Value;

use crate::plugin_system::class::{Factory, PluginClass};
use crate::plugin_system::compose;
use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::instance::PluginInstance;
use crate::plugin_system::mediator::InnerMediator;
use crate::plugin_system::member::Method;
use crate::plugin_system::registry::Registry;

/// Outcome of resolving a plugin by name: an instance for class plugins, the
/// returned value for function plugins.
#[derive(Debug, Clone)]
pub enum Resolved {
    Instance(Arc<PluginInstance>),
    Value(Value),
}

impl Resolved {
    pub fn instance(&self) -> Option<&Arc<PluginInstance>> {
        match self {
            Resolved::Instance(instance) => Some(instance),
            Resolved::Value(_) => None,
        }
    }

    pub fn into_instance(self) -> Option<Arc<PluginInstance>> {
        match self {
            Resolved::Instance(instance) => Some(instance),
            Resolved::Value(_) => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Resolved::Value(value) => Some(value),
            Resolved::Instance(_) => None,
        }
    }
}

#[derive(Default)]
struct LoaderState {
    instances: Vec<Arc<PluginInstance>>,
    initialised: bool,
    mocks: Vec<(String, Method)>,
}

pub struct PluginLoader {
    this: Weak<PluginLoader>,
    name: String,
    factory: Factory,
    registry: Weak<Registry>,
    state: Mutex<LoaderState>,
    /// Uninitialised instance backing `call_method`.
    prototype: OnceLock<Arc<PluginInstance>>,
}

impl fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PluginLoader")
            .field("name", &self.name)
            .field("factory", &self.factory)
            .field("instances", &state.instances.len())
            .field("initialised", &state.initialised)
            .field("mocks", &state.mocks.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

impl PluginLoader {
    pub(crate) fn new(name: &str, factory: Factory, registry: Weak<Registry>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            name: name.to_string(),
            factory,
            registry,
            state: Mutex::new(LoaderState::default()),
            prototype: OnceLock::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    pub fn is_function(&self) -> bool {
        self.factory.is_function()
    }

    pub fn is_singleton(&self) -> bool {
        self.factory.is_singleton()
    }

    /// Whether the singleton instance has been built at least once.
    pub fn is_initialised(&self) -> bool {
        self.state.lock().initialised
    }

    pub fn get_instances(&self) -> Vec<Arc<PluginInstance>> {
        self.state.lock().instances.clone()
    }

    pub fn instance_count(&self) -> usize {
        self.state.lock().instances.len()
    }

    /// Lower-cased names of the plugins this one requires.
    pub fn get_dependencies(&self) -> Vec<String> {
        self.factory
            .dependencies()
            .iter()
            .map(|name| name.to_lowercase())
            .collect()
    }

    /// Dependencies with no loader registered under their name.
    pub fn unmet_dependencies(&self) -> Vec<String> {
        let registry = self.registry.upgrade();
        self.get_dependencies()
            .into_iter()
            .filter(|name| {
                registry
                    .as_ref()
                    .map(|registry| !registry.has_plugin(name))
                    .unwrap_or(true)
            })
            .collect()
    }

    pub fn dependencies_fulfilled(&self) -> bool {
        self.unmet_dependencies().is_empty()
    }

    fn check_dependencies(&self) -> Result<()> {
        let missing = self.unmet_dependencies();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PluginSystemError::MissingDependency {
                plugin: self.name.clone(),
                missing,
            })
        }
    }

    fn class(&self) -> Result<Arc<PluginClass>> {
        self.factory
            .as_class()
            .cloned()
            .ok_or_else(|| PluginSystemError::NotConstructible { plugin: self.name.clone() })
    }

    fn registry(&self) -> Result<Arc<Registry>> {
        self.registry.upgrade().ok_or_else(|| {
            PluginSystemError::InternalError(format!(
                "registry dropped while loading plugin \"{}\"",
                self.name
            ))
        })
    }

    fn mocks(&self) -> Vec<(String, Method)> {
        self.state.lock().mocks.clone()
    }

    fn build(&self, class: &Arc<PluginClass>, args: &[Value]) -> Result<Arc<PluginInstance>> {
        let registry = self.registry()?;
        let instance = PluginInstance::new(
            &self.name,
            class.clone(),
            InnerMediator::new(self.registry.clone()),
        );

        let loader = self.this.clone();
        instance.set_detach_hook(Box::new(move |id| {
            if let Some(loader) = loader.upgrade() {
                loader.forget(id);
            }
        }));

        instance.construct(args)?;
        compose::load_traits(&instance, |name| registry.get_trait(name))?;
        instance.init()?;
        registry.debug(&format!("Built instance {} of \"{}\"", instance.id(), self.name));
        Ok(instance)
    }

    fn forget(&self, id: u64) {
        self.state.lock().instances.retain(|instance| instance.id() != id);
    }

    /// Obtain an instance of a class plugin.
    ///
    /// Singletons return their one tracked instance, building it on first
    /// use; every other plugin gets a fresh instance per call. Active mocks
    /// are re-applied to whatever is returned.
    pub fn get_instance(&self, args: &[Value]) -> Result<Arc<PluginInstance>> {
        let class = self.class()?;
        self.check_dependencies()?;

        if class.is_singleton() {
            if self.instance_count() == 0 {
                self.initialise_singleton(args)?;
            }
            let (instance, mocks) = {
                let state = self.state.lock();
                (state.instances.first().cloned(), state.mocks.clone())
            };
            let instance = instance.ok_or_else(|| {
                PluginSystemError::InternalError(format!(
                    "singleton \"{}\" has no instance after initialisation",
                    self.name
                ))
            })?;
            instance.apply_mocks(&mocks);
            return Ok(instance);
        }

        let instance = self.build(&class, args)?;
        let mocks = {
            let mut state = self.state.lock();
            state.instances.push(instance.clone());
            state.mocks.clone()
        };
        instance.apply_mocks(&mocks);
        Ok(instance)
    }

    /// Resolve this plugin: construct (or reuse) an instance of a class
    /// plugin, or call a function plugin.
    pub fn resolve(&self, args: &[Value]) -> Result<Resolved> {
        match &self.factory {
            Factory::Function(function) => {
                function(&InnerMediator::new(self.registry.clone()), args).map(Resolved::Value)
            }
            Factory::Class(_) => self.get_instance(args).map(Resolved::Instance),
        }
    }

    /// Build the singleton instance if there is none yet. Does nothing for
    /// non-singletons or when the instance already exists.
    pub fn initialise_singleton(&self, args: &[Value]) -> Result<()> {
        let class = match self.factory.as_class() {
            Some(class) if class.is_singleton() => class.clone(),
            _ => return Ok(()),
        };
        if self.instance_count() > 0 {
            return Ok(());
        }
        self.check_dependencies()?;

        let instance = self.build(&class, args)?;
        let mut state = self.state.lock();
        // Another caller may have built the singleton meanwhile.
        if state.instances.is_empty() {
            state.instances.push(instance);
        }
        state.initialised = true;
        Ok(())
    }

    /// Replace `method` with `callback` on every instance this loader hands
    /// out until [`unmock`](Self::unmock) is called.
    pub fn mock<F>(&self, method: &str, callback: F) -> Result<()>
    where
        F: Fn(&PluginInstance, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let class = match self.factory.as_class() {
            Some(class) if class.has_method(method) => class.clone(),
            _ => {
                return Err(PluginSystemError::UnknownMethod {
                    plugin: self.name.clone(),
                    method: method.to_string(),
                })
            }
        };
        if class.is_singleton() && self.instance_count() == 0 {
            self.initialise_singleton(&[])?;
        }

        let callback: Method = Arc::new(callback);
        let (instances, mocks) = {
            let mut state = self.state.lock();
            state.mocks.retain(|(name, _)| name != method);
            state.mocks.push((method.to_string(), callback));
            (state.instances.clone(), state.mocks.clone())
        };
        for instance in instances {
            instance.apply_mocks(&mocks);
        }
        log::debug!("Mocked \"{}\" on plugin \"{}\"", method, self.name);
        Ok(())
    }

    /// Remove the mock for `method` and restore the original on live
    /// instances. Unknown names are ignored.
    pub fn unmock(&self, method: &str) {
        let (removed, instances) = {
            let mut state = self.state.lock();
            let before = state.mocks.len();
            state.mocks.retain(|(name, _)| name != method);
            (state.mocks.len() < before, state.instances.clone())
        };
        if !removed {
            return;
        }
        for instance in instances {
            instance.restore_member(method);
        }
        if let Some(prototype) = self.prototype.get() {
            prototype.restore_member(method);
        }
    }

    pub fn has_method(&self, method: &str) -> bool {
        match &self.factory {
            Factory::Class(class) => class.has_method(method),
            Factory::Function(_) => false,
        }
    }

    /// Call a method without constructing a live instance. Function plugins
    /// are simply invoked.
    pub fn call_method(&self, method: &str, args: &[Value]) -> Result<Value> {
        match &self.factory {
            Factory::Function(function) => function(&InnerMediator::new(self.registry.clone()), args),
            Factory::Class(class) => {
                if !class.has_method(method) {
                    return Err(PluginSystemError::UnknownMethod {
                        plugin: self.name.clone(),
                        method: method.to_string(),
                    });
                }
                let prototype = self
                    .prototype
                    .get_or_init(|| {
                        PluginInstance::new(
                            &self.name,
                            class.clone(),
                            InnerMediator::new(self.registry.clone()),
                        )
                    })
                    .clone();
                prototype.apply_mocks(&self.mocks());
                prototype.call(method, args)
            }
        }
    }
}
