//! # plugload-config
//!
//! Configuration for the loader. Reads `plugload.toml` next to the loader
//! library (or from an explicit path), then applies environment overrides.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::PlugloadConfig;
pub use schema::{
    ConfigWarning, DuplicatePolicy, LoggingConfig, PluginsConfig, WarningSeverity,
};
