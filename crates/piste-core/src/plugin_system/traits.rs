use std::fmt;

use serde_json::Value;

use crate::plugin_system::error::Result;
use crate::plugin_system::instance::PluginInstance;
use crate::plugin_system::member::{is_reserved, Listener, Member};

/// A reusable bundle of properties and methods grafted onto plugin instances.
///
/// A method named `construct` is the trait's own construction hook. It is
/// never grafted; the composer calls it on the target instance with the
/// per-trait configuration as its only argument.
#[derive(Clone)]
pub struct TraitDescriptor {
    name: String,
    properties: Vec<(String, Value)>,
    methods: Vec<(String, Member)>,
    listens: Vec<(String, Listener)>,
}

impl TraitDescriptor {
    pub fn builder(name: &str) -> TraitDescriptorBuilder {
        TraitDescriptorBuilder {
            descriptor: TraitDescriptor {
                name: name.to_string(),
                properties: Vec::new(),
                methods: Vec::new(),
                listens: Vec::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[(String, Value)] {
        &self.properties
    }

    pub fn methods(&self) -> &[(String, Member)] {
        &self.methods
    }

    pub fn listens(&self) -> &[(String, Listener)] {
        &self.listens
    }

    pub fn listens_to(&self, event: &str) -> bool {
        self.listens.iter().any(|(name, _)| name == event)
    }

    /// The trait's own construction hook, if any.
    pub fn construct_hook(&self) -> Option<&Member> {
        self.methods
            .iter()
            .find(|(name, member)| name == "construct" && member.is_callable())
            .map(|(_, member)| member)
    }

    /// Properties followed by methods, with lifecycle names removed.
    pub fn graftable_members(&self) -> Vec<(String, Member)> {
        self.properties
            .iter()
            .map(|(name, value)| (name.clone(), Member::Property(value.clone())))
            .chain(self.methods.iter().cloned())
            .filter(|(name, _)| !is_reserved(name))
            .collect()
    }
}

impl fmt::Debug for TraitDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraitDescriptor")
            .field("name", &self.name)
            .field("properties", &self.properties)
            .field("methods", &self.methods.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

pub struct TraitDescriptorBuilder {
    descriptor: TraitDescriptor,
}

impl TraitDescriptorBuilder {
    pub fn property(mut self, name: &str, value: Value) -> Self {
        self.descriptor.properties.retain(|(existing, _)| existing != name);
        self.descriptor.properties.push((name.to_string(), value));
        self
    }

    pub fn member(mut self, name: &str, member: Member) -> Self {
        self.descriptor.methods.retain(|(existing, _)| existing != name);
        self.descriptor.methods.push((name.to_string(), member));
        self
    }

    pub fn method<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&PluginInstance, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.member(name, Member::method(f))
    }

    pub fn construct<F>(self, f: F) -> Self
    where
        F: Fn(&PluginInstance, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.method("construct", f)
    }

    pub fn listens(mut self, event: &str, listener: impl Into<Listener>) -> Self {
        self.descriptor.listens.retain(|(name, _)| name != event);
        self.descriptor.listens.push((event.to_string(), listener.into()));
        self
    }

    pub fn build(self) -> TraitDescriptor {
        self.descriptor
    }
}
