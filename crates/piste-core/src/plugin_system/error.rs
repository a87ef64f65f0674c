//! # Piste Plugin System Errors
//!
//! Defines error types specific to the plugin system.
//!
//! [`PluginSystemError`] covers everything the registry, the loaders and the
//! trait composer can report: unmet dependencies, unknown methods, forbidden
//! registry operations reached through the internal mediator, and failures
//! raised by plugin or trait code itself.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginSystemError {
    #[error("The \"{plugin}\" plugin requires the following plugins: {}", .missing.join(", "))]
    MissingDependency {
        plugin: String,
        missing: Vec<String>,
    },

    #[error("Method \"{method}\" does not exist on the \"{plugin}\" plugin")]
    UnknownMethod {
        plugin: String,
        method: String,
    },

    #[error("Trait \"{name}\" not found")]
    MissingTrait {
        name: String,
    },

    #[error("Invalid configuration for \"{plugin}\": {message}")]
    InvalidConfiguration {
        plugin: String,
        message: String,
    },

    #[error("The \"{operation}\" operation cannot be called from within a plugin or trait")]
    ForbiddenOperation {
        operation: String,
    },

    #[error("No plugin called \"{name}\" has been registered")]
    PluginNotFound {
        name: String,
    },

    #[error("The name \"{name}\" is a reserved word and cannot be used as a plugin")]
    ReservedName {
        name: String,
    },

    #[error("The \"{plugin}\" plugin is a function and cannot be constructed")]
    NotConstructible {
        plugin: String,
    },

    #[error("Listener on \"{plugin}\" failed during event \"{event}\": {source}")]
    ListenerFailed {
        event: String,
        plugin: String,
        #[source]
        source: Box<PluginSystemError>,
    },

    #[error("Operation error in plugin '{plugin}': {message}")]
    OperationError {
        plugin: String,
        message: String,
    },

    #[error("Internal plugin system error: {0}")]
    InternalError(String),
}

impl PluginSystemError {
    /// Shorthand used by plugin and trait code to fail an operation.
    pub fn operation(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        PluginSystemError::OperationError {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

/// Shorthand for Result with the plugin system error type
pub type Result<T> = std::result::Result<T, PluginSystemError>;
