// Shared helpers for plugin system tests
#![cfg(test)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::plugin_system::class::PluginClass;

/// Shared call counter for lifecycle hooks.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A class whose construct and init hooks bump the given counters and whose
/// `greet` method answers "hello".
pub fn counting_class(name: &str, singleton: bool, constructs: &Counter, inits: &Counter) -> PluginClass {
    let constructs = constructs.clone();
    let inits = inits.clone();
    PluginClass::builder(name)
        .singleton(singleton)
        .construct(move |_this, _args| {
            constructs.bump();
            Ok(Value::Null)
        })
        .init(move |_this, _args| {
            inits.bump();
            Ok(Value::Null)
        })
        .method("greet", |_this, _args| Ok(json!("hello")))
        .build()
}

/// A bare class with no hooks.
pub fn plain_class(name: &str) -> PluginClass {
    PluginClass::builder(name).build()
}
