//! Faulty: a plugin whose `initialize` panics.
//!
//! Drop it next to working plugins to watch the host exclude it and carry
//! on. The panic never leaves this library: [`factory`] wraps the instance
//! so the host sees `PluginError::Panicked`.

use std::sync::Arc;

use plugload_contract::{Plugin, PluginContext, PluginError, PluginRegistrar, export_plugin, factory};

#[derive(Default)]
pub struct Faulty;

impl Plugin for Faulty {
    fn name(&self) -> &str {
        "Faulty"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn initialize(&self, _context: Arc<dyn PluginContext>) -> Result<(), PluginError> {
        panic!("faulty plugin refuses to start")
    }

    fn shutdown(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

fn register(registrar: &mut dyn PluginRegistrar) {
    registrar.register_plugin("Faulty", factory::<Faulty>());
}

export_plugin!(register);
