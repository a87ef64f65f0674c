//! Plugin classes and factories.
//!
//! A [`PluginClass`] is the declarative description of a plugin: its own
//! members, an optional parent class, whether it is a singleton, which plugins
//! it depends on, which traits it requests and which global events it listens
//! to. Classes are immutable once built; [`Factory`] is what gets registered.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::plugin_system::error::Result;
use crate::plugin_system::instance::PluginInstance;
use crate::plugin_system::mediator::InnerMediator;
use crate::plugin_system::member::{Listener, Member};

/// A trait requested by a class, with the configuration handed to the trait's
/// own `construct` hook.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitRequest {
    pub name: String,
    pub config: Option<Value>,
}

impl TraitRequest {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), config: None }
    }

    pub fn with_config(name: &str, config: Value) -> Self {
        Self { name: name.to_string(), config: Some(config) }
    }
}

impl From<&str> for TraitRequest {
    fn from(name: &str) -> Self {
        TraitRequest::new(name)
    }
}

/// Declarative plugin class.
pub struct PluginClass {
    name: String,
    parent: Option<Arc<PluginClass>>,
    members: Vec<(String, Member)>,
    singleton: bool,
    dependencies: Vec<String>,
    traits: Vec<TraitRequest>,
    listens: Vec<(String, Listener)>,
    event_prefix: Option<String>,
}

impl PluginClass {
    pub fn builder(name: &str) -> PluginClassBuilder {
        PluginClassBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<PluginClass>> {
        self.parent.as_ref()
    }

    /// This class followed by each of its ancestors, nearest first.
    pub fn ancestry(&self) -> Vec<&PluginClass> {
        let mut chain = vec![self];
        let mut current = self.parent.as_deref();
        while let Some(class) = current {
            chain.push(class);
            current = class.parent.as_deref();
        }
        chain
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Traits declared at this level of the ancestry only.
    pub fn traits(&self) -> &[TraitRequest] {
        &self.traits
    }

    pub fn event_prefix(&self) -> Option<&str> {
        self.event_prefix.as_deref()
    }

    /// Members declared at this level of the ancestry only.
    pub fn own_members(&self) -> &[(String, Member)] {
        &self.members
    }

    /// Find a member anywhere in the class chain; the nearest declaration wins.
    pub fn find_member(&self, name: &str) -> Option<&Member> {
        self.ancestry().into_iter().find_map(|class| {
            class
                .members
                .iter()
                .find(|(member_name, _)| member_name == name)
                .map(|(_, member)| member)
        })
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.find_member(name).map(Member::is_callable).unwrap_or(false)
    }

    /// Flatten the class chain into one member table.
    pub fn collect_members(&self) -> HashMap<String, Member> {
        let mut members = HashMap::new();
        for class in self.ancestry() {
            for (name, member) in &class.members {
                members.entry(name.clone()).or_insert_with(|| member.clone());
            }
        }
        members
    }

    /// Flatten the listens maps of the class chain; subclasses win.
    pub fn collect_listens(&self) -> Vec<(String, Listener)> {
        let mut seen = HashSet::new();
        let mut listens = Vec::new();
        for class in self.ancestry() {
            for (event, listener) in &class.listens {
                if seen.insert(event.clone()) {
                    listens.push((event.clone(), listener.clone()));
                }
            }
        }
        listens
    }

    pub fn listens_to(&self, event: &str) -> bool {
        self.ancestry()
            .iter()
            .any(|class| class.listens.iter().any(|(name, _)| name == event))
    }
}

impl fmt::Debug for PluginClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginClass")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("singleton", &self.singleton)
            .field("dependencies", &self.dependencies)
            .field("traits", &self.traits)
            .field("members", &self.members.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`PluginClass`].
///
/// Extending a parent inherits its singleton flag, dependencies and event
/// prefix unless they are set explicitly, in any order. Members and traits
/// are never copied: they are resolved by walking the ancestry.
pub struct PluginClassBuilder {
    class: PluginClass,
    singleton: Option<bool>,
    dependencies: Option<Vec<String>>,
    event_prefix: Option<String>,
}

impl PluginClassBuilder {
    fn new(name: &str) -> Self {
        Self {
            class: PluginClass {
                name: name.to_string(),
                parent: None,
                members: Vec::new(),
                singleton: false,
                dependencies: Vec::new(),
                traits: Vec::new(),
                listens: Vec::new(),
                event_prefix: None,
            },
            singleton: None,
            dependencies: None,
            event_prefix: None,
        }
    }

    pub fn extends(mut self, parent: Arc<PluginClass>) -> Self {
        self.class.parent = Some(parent);
        self
    }

    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = Some(singleton);
        self
    }

    pub fn dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = Some(dependencies.into_iter().map(Into::into).collect());
        self
    }

    pub fn traits<I, T>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TraitRequest>,
    {
        self.class.traits = traits.into_iter().map(Into::into).collect();
        self
    }

    pub fn listens(mut self, event: &str, listener: impl Into<Listener>) -> Self {
        self.class.listens.retain(|(name, _)| name != event);
        self.class.listens.push((event.to_string(), listener.into()));
        self
    }

    pub fn event_prefix(mut self, prefix: &str) -> Self {
        self.event_prefix = Some(prefix.to_string());
        self
    }

    pub fn member(mut self, name: &str, member: Member) -> Self {
        self.class.members.retain(|(existing, _)| existing != name);
        self.class.members.push((name.to_string(), member));
        self
    }

    pub fn property(self, name: &str, value: Value) -> Self {
        self.member(name, Member::Property(value))
    }

    pub fn method<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&PluginInstance, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.member(name, Member::method(f))
    }

    /// Lifecycle hook run with the arguments passed to `get_instance`, before
    /// traits are composed.
    pub fn construct<F>(self, f: F) -> Self
    where
        F: Fn(&PluginInstance, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.method("construct", f)
    }

    /// Lifecycle hook run after traits are composed.
    pub fn init<F>(self, f: F) -> Self
    where
        F: Fn(&PluginInstance, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.method("init", f)
    }

    /// Teardown hook run by `destructor()`.
    pub fn destruct<F>(self, f: F) -> Self
    where
        F: Fn(&PluginInstance, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.method("destruct", f)
    }

    pub fn build(self) -> PluginClass {
        let PluginClassBuilder { mut class, singleton, dependencies, event_prefix } = self;
        let parent = class.parent.clone();
        class.singleton = singleton
            .or_else(|| parent.as_ref().map(|p| p.singleton))
            .unwrap_or(false);
        class.dependencies = dependencies
            .or_else(|| parent.as_ref().map(|p| p.dependencies.clone()))
            .unwrap_or_default();
        class.event_prefix = event_prefix.or_else(|| parent.as_ref().and_then(|p| p.event_prefix.clone()));
        class
    }
}

/// A plugin implemented as a plain function instead of a class.
pub type PluginFunction = Arc<dyn Fn(&InnerMediator, &[Value]) -> Result<Value> + Send + Sync>;

/// What gets registered under a plugin name.
#[derive(Clone)]
pub enum Factory {
    Class(Arc<PluginClass>),
    Function(PluginFunction),
}

impl Factory {
    pub fn class(class: PluginClass) -> Self {
        Factory::Class(Arc::new(class))
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&InnerMediator, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Factory::Function(Arc::new(f))
    }

    pub fn as_class(&self) -> Option<&Arc<PluginClass>> {
        match self {
            Factory::Class(class) => Some(class),
            Factory::Function(_) => None,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Factory::Function(_))
    }

    pub fn is_singleton(&self) -> bool {
        self.as_class().map(|class| class.is_singleton()).unwrap_or(false)
    }

    pub fn dependencies(&self) -> &[String] {
        match self {
            Factory::Class(class) => class.dependencies(),
            Factory::Function(_) => &[],
        }
    }
}

impl From<PluginClass> for Factory {
    fn from(class: PluginClass) -> Self {
        Factory::class(class)
    }
}

impl From<Arc<PluginClass>> for Factory {
    fn from(class: Arc<PluginClass>) -> Self {
        Factory::Class(class)
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factory::Class(class) => f.debug_tuple("Class").field(&class.name()).finish(),
            Factory::Function(_) => f.write_str("Function(..)"),
        }
    }
}
