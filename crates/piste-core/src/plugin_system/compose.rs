//! Trait composition.
//!
//! Traits are applied once, between an instance's `construct` and `init`
//! hooks. Requests are gathered by walking the class ancestry from the
//! concrete class upwards, and each trait member is written only if the
//! instance does not already have a member with that name. The first writer
//! always wins: instance members, then base-class members, then traits in
//! collection order.
use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::plugin_system::class::{PluginClass, TraitRequest};
use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::instance::PluginInstance;
use crate::plugin_system::member::Member;
use crate::plugin_system::traits::TraitDescriptor;

/// Trait requests of the whole ancestry, deduplicated by name. The first
/// occurrence keeps its position and its configuration.
pub fn collect_trait_requests(class: &PluginClass) -> Vec<TraitRequest> {
    let mut seen = HashSet::new();
    let mut requests = Vec::new();
    for level in class.ancestry() {
        for request in level.traits() {
            if seen.insert(request.name.to_lowercase()) {
                requests.push(request.clone());
            }
        }
    }
    requests
}

/// Apply every requested trait to `instance`.
///
/// `lookup` resolves a trait name to its descriptor. Unknown traits are
/// logged and skipped; an error from a trait's own `construct` hook fails the
/// composition.
pub fn load_traits<F>(instance: &PluginInstance, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<Arc<TraitDescriptor>>,
{
    for request in collect_trait_requests(instance.class()) {
        let descriptor = match lookup(&request.name) {
            Some(descriptor) => descriptor,
            None => {
                let missing = PluginSystemError::MissingTrait { name: request.name.clone() };
                log::warn!("{} (requested by \"{}\")", missing, instance.plugin_name());
                continue;
            }
        };
        apply_trait(instance, &descriptor, request.config.as_ref())?;
    }
    Ok(())
}

fn apply_trait(
    instance: &PluginInstance,
    descriptor: &TraitDescriptor,
    config: Option<&Value>,
) -> Result<()> {
    let mut applied = Vec::new();
    for (name, member) in descriptor.graftable_members() {
        if instance.define_if_absent(&name, member) {
            applied.push(name);
        }
    }
    for (event, listener) in descriptor.listens() {
        instance.add_listener_if_absent(event, listener.clone());
    }
    log::debug!(
        "Applied trait \"{}\" to \"{}\": {:?}",
        descriptor.name(),
        instance.plugin_name(),
        applied
    );

    match descriptor.construct_hook() {
        Some(Member::Method(construct)) => {
            let config = config.cloned().unwrap_or(Value::Null);
            construct(instance, &[config])?;
        }
        Some(_) => {
            return Err(PluginSystemError::operation(
                instance.plugin_name(),
                format!("construct hook of trait \"{}\" cannot be asynchronous", descriptor.name()),
            ));
        }
        None => {}
    }
    Ok(())
}
