//! Configuration Module
//!
//! Configuration loading and dependency injection for the sync layer.

mod container;
mod settings;

pub use container::SyncContainer;
pub use settings::{
    ConfigError, DEFAULT_ORIGIN, Endpoints, ObservabilitySettings, RestSettings, StreamSettings,
    SyncConfig,
};
