//! Built-in traits registered by
//! [`Registry::attach_abstracts`](crate::plugin_system::Registry::attach_abstracts).
pub mod configurable;
pub mod fires_events;

pub use configurable::Element;
