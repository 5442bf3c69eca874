//! Resolves the native `greeter` library through its own module scope and
//! reports that library's version as the plugin version.
//!
//! Layout of one plugin directory:
//!
//! ```text
//! Managed/GreeterOne/
//!     libversioned_greeter.so
//!     plugin.toml            # search_paths = ["deps"]
//!     deps/libgreeter.so     # greeter 1.0.0
//! ```

use std::ffi::{CStr, c_char};
use std::path::PathBuf;
use std::sync::Arc;

use libloading::{Library, Symbol};
use plugload_contract::{Guarded, Plugin, PluginContext, PluginError, PluginRegistrar, export_plugin, guard};

pub struct VersionedGreeter {
    name: String,
    version: String,
    /// Keeps `greeter` mapped for as long as the plugin lives.
    _greeter: Library,
}

impl VersionedGreeter {
    fn open(greeter: Option<PathBuf>) -> Result<Self, PluginError> {
        // No bundled copy: fall back to the platform's default lookup.
        let path = greeter.unwrap_or_else(|| PathBuf::from(libloading::library_filename("greeter")));
        let library = unsafe { Library::new(&path) }
            .map_err(|e| PluginError::DependencyNotFound(format!("greeter ({}): {e}", path.display())))?;

        let version = unsafe {
            let greeter_version: Symbol<unsafe extern "C" fn() -> *const c_char> = library
                .get(b"greeter_version\0")
                .map_err(|e| PluginError::Construction(e.to_string()))?;
            let raw = greeter_version();
            if raw.is_null() {
                return Err(PluginError::Construction("greeter_version returned null".into()));
            }
            CStr::from_ptr(raw).to_string_lossy().into_owned()
        };

        Ok(Self {
            name: format!("VersionedGreeter-{version}"),
            version,
            _greeter: library,
        })
    }
}

impl Plugin for VersionedGreeter {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn initialize(&self, context: Arc<dyn PluginContext>) -> Result<(), PluginError> {
        context
            .logger()
            .info(&format!("greeter {} says hello", self.version));
        Ok(())
    }

    fn shutdown(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

fn register(registrar: &mut dyn PluginRegistrar) {
    let greeter = registrar.resolve_dependency("greeter");
    registrar.register_plugin(
        "VersionedGreeter",
        Box::new(move || guard(|| Ok(Guarded::boxed(VersionedGreeter::open(greeter.clone())?)))),
    );
}

export_plugin!(register);
