//! Module declaration exported by every plugin library.
//!
//! Plugin types are not discovered by reflection. Each module exports one
//! static [`PluginDeclaration`] under [`DECLARATION_SYMBOL`]; the host maps
//! the module, reads the declaration and calls its `register` callback, which
//! hands one [`PluginFactory`] per activatable type to the host.
//!
//! Everything the host calls through a declaration runs module code, so it
//! must not unwind back into the host (see [`guard`](mod@crate::guard)).

use std::path::PathBuf;

use crate::error::PluginError;
use crate::guard::{Guarded, guard};
use crate::plugin::Plugin;

/// Layout version of [`PluginDeclaration`]. Bumped on any field change.
pub const ABI_VERSION: u32 = 1;

/// Version of this crate. The host only accepts modules built against this
/// exact version: [`Plugin`], [`PluginRegistrar`] and [`PluginFactory`]
/// cross the module boundary as trait objects, and their vtable layout is
/// not covered by [`ABI_VERSION`].
pub const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name of this crate. A module scope never resolves it from a
/// plugin directory.
pub const CONTRACT_MODULE_NAME: &str = "plugload_contract";

/// Symbol name of the exported declaration, NUL-terminated for symbol lookup.
pub const DECLARATION_SYMBOL: &[u8] = b"PLUGLOAD_PLUGIN_DECLARATION\0";

/// Builds one plugin instance. Must not panic: wrap hand-written factories
/// in [`guard`](crate::guard::guard).
pub type PluginFactory = Box<dyn Fn() -> Result<Box<dyn Plugin>, PluginError> + Send + Sync>;

/// Collects the activatable types of a module during registration.
pub trait PluginRegistrar {
    /// Record an activatable type. Types are activated in registration order.
    fn register_plugin(&mut self, type_name: &str, factory: PluginFactory);

    /// Resolve a dependency bundled next to the module, using the module's
    /// own scope. Returns `None` when the scope has no match, in which case
    /// the platform's default lookup applies.
    fn resolve_dependency(&self, name: &str) -> Option<PathBuf>;

    /// The registration callback panicked. Types registered before the
    /// panic are discarded by the host.
    fn registration_failed(&mut self, message: &str);
}

/// The static every plugin module exports under [`DECLARATION_SYMBOL`].
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct PluginDeclaration {
    /// Must be the first field: the host reads it before anything else.
    pub abi_version: u32,
    pub contract_version: &'static str,
    pub register: fn(&mut dyn PluginRegistrar),
}

impl PluginDeclaration {
    /// Declaration built against this contract version.
    pub const fn new(register: fn(&mut dyn PluginRegistrar)) -> Self {
        Self {
            abi_version: ABI_VERSION,
            contract_version: CONTRACT_VERSION,
            register,
        }
    }
}

/// Factory that builds the type's default instance, wrapped in [`Guarded`].
/// A panicking `Default` comes back as [`PluginError::Panicked`].
pub fn factory<P>() -> PluginFactory
where
    P: Plugin + Default + 'static,
{
    Box::new(|| guard(|| Ok(Guarded::boxed(P::default()))))
}

/// Export the module declaration for a registration function. A panic in the
/// function is reported through [`PluginRegistrar::registration_failed`].
///
/// ```ignore
/// fn register(registrar: &mut dyn plugload_contract::PluginRegistrar) { /* ... */ }
/// plugload_contract::export_plugin!(register);
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($register:path) => {
        #[doc(hidden)]
        fn __plugload_register(registrar: &mut dyn $crate::PluginRegistrar) {
            $crate::guard::register_guarded(registrar, $register);
        }

        #[doc(hidden)]
        #[unsafe(no_mangle)]
        pub static PLUGLOAD_PLUGIN_DECLARATION: $crate::PluginDeclaration =
            $crate::PluginDeclaration::new(__plugload_register);
    };
}
