//! Hello World: minimal plugload plugin.
//!
//! Build with `cargo build --release`, then copy the library (e.g.
//! `target/release/libhello_world.so`) and `plugin.toml` into
//! `<plugin root>/Managed/HelloWorld/`.

use std::sync::{Arc, Mutex};

use plugload_contract::{Plugin, PluginContext, PluginError, PluginRegistrar, export_plugin, factory};

#[derive(Default)]
pub struct HelloWorld {
    context: Mutex<Option<Arc<dyn PluginContext>>>,
}

impl Plugin for HelloWorld {
    fn name(&self) -> &str {
        "HelloWorld"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn initialize(&self, context: Arc<dyn PluginContext>) -> Result<(), PluginError> {
        context.logger().info("Hello from a plugload plugin!");
        let others: Vec<String> = context
            .loaded_plugins()
            .iter()
            .map(|p| format!("{} v{}", p.name(), p.version()))
            .collect();
        if !others.is_empty() {
            context.logger().info(&format!("already loaded: {}", others.join(", ")));
        }

        let mut slot = self
            .context
            .lock()
            .map_err(|e| PluginError::Initialization(e.to_string()))?;
        *slot = Some(context);
        Ok(())
    }

    fn shutdown(&self) -> Result<(), PluginError> {
        let context = self
            .context
            .lock()
            .map_err(|e| PluginError::Shutdown(e.to_string()))?
            .take();
        if let Some(context) = context {
            context.logger().info("Goodbye from HelloWorld");
        }
        Ok(())
    }
}

fn register(registrar: &mut dyn PluginRegistrar) {
    registrar.register_plugin("HelloWorld", factory::<HelloWorld>());
}

export_plugin!(register);
