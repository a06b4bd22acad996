//! Process configuration and path discovery.

pub mod settings;

pub use settings::{Settings, ENDPOINT_NAME};
