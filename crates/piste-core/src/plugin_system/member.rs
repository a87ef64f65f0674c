use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::plugin_system::error::Result;
use crate::plugin_system::instance::PluginInstance;

/// A synchronous method. The instance it runs against is always passed first.
pub type Method = Arc<dyn Fn(&PluginInstance, &[Value]) -> Result<Value> + Send + Sync>;

/// A method producing a deferred result, awaited by promise events.
pub type AsyncMethod =
    Arc<dyn Fn(Arc<PluginInstance>, Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Member names owned by the instance lifecycle. Trait composition never
/// carries these over.
pub const RESERVED_MEMBERS: &[&str] = &[
    "constructor",
    "construct",
    "init",
    "registry",
    "destruct",
    "destructor",
    "detach",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_MEMBERS.contains(&name)
}

/// A single named member of a plugin class, trait or live instance.
#[derive(Clone)]
pub enum Member {
    Property(Value),
    Method(Method),
    AsyncMethod(AsyncMethod),
}

impl Member {
    pub fn method<F>(f: F) -> Self
    where
        F: Fn(&PluginInstance, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Member::Method(Arc::new(f))
    }

    pub fn async_method<F>(f: F) -> Self
    where
        F: Fn(Arc<PluginInstance>, Vec<Value>) -> BoxFuture<'static, Result<Value>>
            + Send
            + Sync
            + 'static,
    {
        Member::AsyncMethod(Arc::new(f))
    }

    /// Whether this member can be invoked.
    pub fn is_callable(&self) -> bool {
        !matches!(self, Member::Property(_))
    }

    pub fn as_property(&self) -> Option<&Value> {
        match self {
            Member::Property(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Property(value) => f.debug_tuple("Property").field(value).finish(),
            Member::Method(_) => f.write_str("Method(..)"),
            Member::AsyncMethod(_) => f.write_str("AsyncMethod(..)"),
        }
    }
}

/// How a global event is wired to an instance.
#[derive(Clone)]
pub enum Listener {
    /// Call the instance member with this name.
    Method(String),
    /// Call this function with the instance as first argument.
    Callback(Method),
}

impl Listener {
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&PluginInstance, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Listener::Callback(Arc::new(f))
    }
}

impl From<&str> for Listener {
    fn from(method: &str) -> Self {
        Listener::Method(method.to_string())
    }
}

impl From<String> for Listener {
    fn from(method: String) -> Self {
        Listener::Method(method)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listener::Method(name) => f.debug_tuple("Method").field(name).finish(),
            Listener::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}
