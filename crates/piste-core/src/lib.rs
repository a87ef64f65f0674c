pub mod abstracts;
pub mod config;
pub mod event;
pub mod plugin_system;

// Re-export key public types for hosts and plugins
pub use config::RegistryConfig;
pub use event::LocalEvents;
pub use plugin_system::{
    Factory, InnerMediator, Listener, Mediator, Member, PluginClass, PluginInstance, PluginLoader,
    PluginSystemError, Registry, Resolved, TraitDescriptor,
};
