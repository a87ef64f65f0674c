//! # Piste Plugin System
//!
//! The registry, the per-plugin loaders and the trait composer.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`class`]**: Declarative plugin classes ([`PluginClass`]) and the
//!   [`Factory`] registered under a plugin name.
//! - **[`compose`]**: Grafts trait members onto freshly constructed instances.
//! - **[`error`]**: [`PluginSystemError`](error::PluginSystemError) and the
//!   `Result` alias used throughout the crate.
//! - **[`instance`]**: Live plugin objects ([`PluginInstance`]).
//! - **[`loader`]**: One [`PluginLoader`] per plugin: dependency checks,
//!   singleton lifecycle, construction and mocks.
//! - **[`mediator`]**: Name-based access to the registry for host code
//!   ([`Mediator`]) and for plugin code ([`InnerMediator`]).
//! - **[`member`]**: Properties, methods and event listeners.
//! - **[`registry`]**: The process-wide [`Registry`].
//! - **[`traits`]**: Reusable member bundles ([`TraitDescriptor`]).
pub mod class;
pub mod compose;
pub mod error;
pub mod instance;
pub mod loader;
pub mod mediator;
pub mod member;
pub mod registry;
pub mod traits;

pub use class::{Factory, PluginClass, PluginClassBuilder, TraitRequest};
pub use error::{PluginSystemError, Result};
pub use instance::PluginInstance;
pub use loader::{PluginLoader, Resolved};
pub use mediator::{InnerMediator, Mediator, PluginAccessor, RegistryMember, Resolution};
pub use member::{Listener, Member};
pub use registry::{Registry, RegistryBuilder};
pub use traits::TraitDescriptor;

// Test module declaration
#[cfg(test)]
mod tests;
