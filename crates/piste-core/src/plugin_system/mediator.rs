//! # Access Mediators
//!
//! All lookups by name go through a mediator. A name first resolves to a
//! registry member (see [`RegistryMember`]), then to a registered plugin, and
//! otherwise to nothing.
//!
//! - [`Mediator`] is what host code holds. It can also unregister plugins by
//!   deleting their name.
//! - [`InnerMediator`] is what plugin and trait code receives. It refuses the
//!   bootstrap operations, which only the host may run, and holds the registry
//!   weakly so live instances never keep it alive.
use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::loader::{PluginLoader, Resolved};
use crate::plugin_system::registry::Registry;

/// Named members of the registry itself. These shadow plugin names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryMember {
    RegisterPlugin,
    RegisterTrait,
    HasPlugin,
    HasTrait,
    GetPlugin,
    GetPluginNames,
    RemovePlugin,
    ListensToEvent,
    GlobalEvent,
    GlobalPromiseEvent,
    AttachAbstracts,
    LoadUtilities,
    Initialise,
    InitSingletons,
    Ready,
    Debug,
}

impl RegistryMember {
    pub const ALL: [RegistryMember; 16] = [
        RegistryMember::RegisterPlugin,
        RegistryMember::RegisterTrait,
        RegistryMember::HasPlugin,
        RegistryMember::HasTrait,
        RegistryMember::GetPlugin,
        RegistryMember::GetPluginNames,
        RegistryMember::RemovePlugin,
        RegistryMember::ListensToEvent,
        RegistryMember::GlobalEvent,
        RegistryMember::GlobalPromiseEvent,
        RegistryMember::AttachAbstracts,
        RegistryMember::LoadUtilities,
        RegistryMember::Initialise,
        RegistryMember::InitSingletons,
        RegistryMember::Ready,
        RegistryMember::Debug,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RegistryMember::RegisterPlugin => "register_plugin",
            RegistryMember::RegisterTrait => "register_trait",
            RegistryMember::HasPlugin => "has_plugin",
            RegistryMember::HasTrait => "has_trait",
            RegistryMember::GetPlugin => "get_plugin",
            RegistryMember::GetPluginNames => "get_plugin_names",
            RegistryMember::RemovePlugin => "remove_plugin",
            RegistryMember::ListensToEvent => "listens_to_event",
            RegistryMember::GlobalEvent => "global_event",
            RegistryMember::GlobalPromiseEvent => "global_promise_event",
            RegistryMember::AttachAbstracts => "attach_abstracts",
            RegistryMember::LoadUtilities => "load_utilities",
            RegistryMember::Initialise => "initialise",
            RegistryMember::InitSingletons => "init_singletons",
            RegistryMember::Ready => "ready",
            RegistryMember::Debug => "debug",
        }
    }

    /// Case-insensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        Self::ALL.into_iter().find(|member| member.name() == lower)
    }

    /// One-time host bootstrap operations, unavailable to plugin code.
    pub fn is_bootstrap(&self) -> bool {
        matches!(
            self,
            RegistryMember::AttachAbstracts
                | RegistryMember::LoadUtilities
                | RegistryMember::Initialise
                | RegistryMember::InitSingletons
        )
    }
}

impl fmt::Display for RegistryMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Curried access to one plugin; [`get`](Self::get) resolves an instance.
#[derive(Clone)]
pub struct PluginAccessor {
    loader: Arc<PluginLoader>,
}

impl PluginAccessor {
    pub fn name(&self) -> &str {
        self.loader.name()
    }

    pub fn loader(&self) -> &Arc<PluginLoader> {
        &self.loader
    }

    pub fn get(&self, args: &[Value]) -> Result<Resolved> {
        self.loader.resolve(args)
    }
}

impl fmt::Debug for PluginAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginAccessor").field("plugin", &self.loader.name()).finish()
    }
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Member(RegistryMember),
    Plugin(PluginAccessor),
}

fn resolve_in(registry: &Registry, name: &str) -> Option<Resolution> {
    if let Some(member) = RegistryMember::from_name(name) {
        return Some(Resolution::Member(member));
    }
    registry
        .get_plugin(name)
        .ok()
        .map(|loader| Resolution::Plugin(PluginAccessor { loader }))
}

fn forbidden(member: RegistryMember) -> PluginSystemError {
    PluginSystemError::ForbiddenOperation {
        operation: member.name().to_string(),
    }
}

/// External access surface, held by host code.
#[derive(Clone)]
pub struct Mediator {
    registry: Arc<Registry>,
}

impl fmt::Debug for Mediator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mediator").finish_non_exhaustive()
    }
}

impl Mediator {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn resolve(&self, name: &str) -> Option<Resolution> {
        resolve_in(&self.registry, name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Deleting a plugin name unregisters the plugin. Every other deletion is
    /// refused.
    pub fn delete(&self, name: &str) -> bool {
        if RegistryMember::from_name(name).is_some() {
            return false;
        }
        self.registry.remove_plugin(name)
    }

    /// Resolve `name` as a plugin and obtain it with `args`.
    pub fn get(&self, name: &str, args: &[Value]) -> Result<Resolved> {
        self.registry.get_plugin(name)?.resolve(args)
    }
}

/// Registry handle given to plugin and trait code.
#[derive(Clone)]
pub struct InnerMediator {
    registry: Weak<Registry>,
}

impl fmt::Debug for InnerMediator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InnerMediator")
            .field("attached", &(self.registry.strong_count() > 0))
            .finish()
    }
}

impl InnerMediator {
    pub(crate) fn new(registry: Weak<Registry>) -> Self {
        Self { registry }
    }

    fn upgrade(&self) -> Result<Arc<Registry>> {
        self.registry
            .upgrade()
            .ok_or_else(|| PluginSystemError::InternalError("registry is no longer available".into()))
    }

    /// Like [`Mediator::resolve`], but bootstrap members are refused.
    pub fn resolve(&self, name: &str) -> Result<Option<Resolution>> {
        let registry = self.upgrade()?;
        match resolve_in(&registry, name) {
            Some(Resolution::Member(member)) if member.is_bootstrap() => Err(forbidden(member)),
            resolution => Ok(resolution),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        matches!(self.resolve(name), Ok(Some(_)))
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.has_plugin(name))
            .unwrap_or(false)
    }

    pub fn has_trait(&self, name: &str) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.has_trait(name))
            .unwrap_or(false)
    }

    pub fn get_plugin_names(&self) -> Vec<String> {
        self.registry
            .upgrade()
            .map(|registry| registry.get_plugin_names())
            .unwrap_or_default()
    }

    pub fn get_plugin(&self, name: &str) -> Result<Arc<PluginLoader>> {
        self.upgrade()?.get_plugin(name)
    }

    pub fn get(&self, name: &str, args: &[Value]) -> Result<Resolved> {
        self.upgrade()?.get_plugin(name)?.resolve(args)
    }

    pub fn global_event(&self, event: &str, args: &[Value]) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.global_event(event, args),
            None => true,
        }
    }

    pub async fn global_promise_event(&self, event: &str, args: Vec<Value>) -> Result<()> {
        self.upgrade()?.global_promise_event(event, args).await
    }

    pub fn debug(&self, message: &str) {
        if let Some(registry) = self.registry.upgrade() {
            registry.debug(message);
        }
    }

    pub fn attach_abstracts(&self) -> Result<()> {
        Err(forbidden(RegistryMember::AttachAbstracts))
    }

    pub fn load_utilities(&self) -> Result<()> {
        Err(forbidden(RegistryMember::LoadUtilities))
    }

    pub fn initialise(&self) -> Result<()> {
        Err(forbidden(RegistryMember::Initialise))
    }

    pub fn init_singletons(&self) -> Result<()> {
        Err(forbidden(RegistryMember::InitSingletons))
    }
}
