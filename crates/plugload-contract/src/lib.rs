//! # plugload-contract
//!
//! The fixed interface shared by the plugload host and every plugin module.
//! A plugin module is a `cdylib` that depends on this crate, implements
//! [`Plugin`] for one or more types and exports a declaration with
//! [`export_plugin!`]:
//!
//! ```ignore
//! use plugload_contract::{PluginRegistrar, export_plugin, factory};
//!
//! #[derive(Default)]
//! struct HelloPlugin;
//!
//! // impl Plugin for HelloPlugin { ... }
//!
//! fn register(registrar: &mut dyn PluginRegistrar) {
//!     registrar.register_plugin("HelloPlugin", factory::<HelloPlugin>());
//! }
//!
//! export_plugin!(register);
//! ```
//!
//! The host and its plugins must be built with the same Rust toolchain and
//! the same version of this crate: trait objects cross the module boundary
//! as-is. Panics never do; see [`guard`](mod@guard).

pub mod context;
pub mod declaration;
pub mod error;
pub mod guard;
pub mod plugin;

pub use context::{PluginContext, PluginLogger};
pub use declaration::{
    ABI_VERSION, CONTRACT_MODULE_NAME, CONTRACT_VERSION, DECLARATION_SYMBOL, PluginDeclaration,
    PluginFactory, PluginRegistrar, factory,
};
pub use error::PluginError;
pub use guard::{Guarded, guard, panic_message};
pub use plugin::Plugin;
