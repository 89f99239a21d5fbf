//! Channel configuration: records, the file store and the shared registry.

pub mod model;
pub mod registry;
pub mod store;

pub use model::{Channel, ChannelKind, ChannelProfile};
pub use registry::ChannelRegistry;
pub use store::ChannelStore;
