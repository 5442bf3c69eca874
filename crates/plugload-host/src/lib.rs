//! # plugload-host
//!
//! Native plugin host. Plugins are shared libraries that implement the
//! `plugload-contract` traits; each plugin directory is loaded into its own
//! module scope so bundled dependencies never leak between directories.
//!
//! ## Plugin layout
//!
//! ```text
//! <root>/Managed/HelloWorld/libhello_world.so
//! <root>/Managed/HelloWorld/plugin.toml        (optional)
//! <root>/Managed/HelloWorld/deps/libgreeter.so (bundled dependency)
//! ```
//!
//! The optional `plugin.toml` manifest maps dependency names to bundled
//! files and pins module checksums:
//!
//! ```toml
//! search_paths = ["deps"]
//!
//! [plugin]
//! name = "hello-world"
//! version = "1.0.0"
//!
//! [dependencies]
//! greeter = "deps/libgreeter.so"
//! ```

pub mod context;
pub mod discovery;
pub mod host;
pub mod loaded;
pub mod logger;
pub mod manifest;
pub mod registry;
pub mod scope;

pub use context::HostContext;
pub use discovery::{Discovered, PluginDiscovery};
pub use host::PluginHost;
pub use loaded::{LoadedPlugin, PluginState};
pub use logger::TracingPluginLogger;
pub use manifest::ScopeManifest;
pub use registry::PluginRegistry;
pub use scope::{
    Module, ModuleLoadError, ModuleLoader, ModuleScope, NativeLoader, PluginType, StaticLoader,
    is_contract_module,
};
