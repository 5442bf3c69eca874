use std::path::{Path, PathBuf};
use std::sync::Arc;

use plugload_contract::{Plugin, PluginContext, PluginLogger};

use crate::logger::TracingPluginLogger;
use crate::registry::PluginRegistry;

/// The host side of [`PluginContext`]: a read-only view of the registry plus
/// logging and the plugin root.
#[derive(Debug)]
pub struct HostContext {
    plugin_directory: PathBuf,
    registry: Arc<PluginRegistry>,
    logger: TracingPluginLogger,
}

impl HostContext {
    pub fn new(plugin_directory: &Path, registry: Arc<PluginRegistry>) -> Self {
        Self {
            plugin_directory: plugin_directory.to_path_buf(),
            registry,
            logger: TracingPluginLogger,
        }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }
}

impl PluginContext for HostContext {
    fn logger(&self) -> &dyn PluginLogger {
        &self.logger
    }

    fn plugin_directory(&self) -> &Path {
        &self.plugin_directory
    }

    fn loaded_plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.registry
            .list()
            .into_iter()
            .map(|p| p as Arc<dyn Plugin>)
            .collect()
    }

    fn find_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.registry.find(name).map(|p| p as Arc<dyn Plugin>)
    }
}
