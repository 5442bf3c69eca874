use std::path::{Path, PathBuf};
use std::sync::Arc;

use plugload_config::PluginsConfig;
use plugload_contract::Plugin;
use plugload_core::{DiscoveryReport, PlugloadError, ShutdownReport};
use tracing::{debug, error, info, warn};

use crate::context::HostContext;
use crate::discovery::PluginDiscovery;
use crate::loaded::LoadedPlugin;
use crate::registry::PluginRegistry;
use crate::scope::{ModuleLoader, ModuleScope, NativeLoader};

/// The plugin host owns the registry, the host context and every module
/// scope created by discovery.
///
/// ## Plugin ABI
///
/// A plugin module is a shared library exporting the static
/// `PLUGLOAD_PLUGIN_DECLARATION` (see `plugload_contract::export_plugin!`).
/// The host maps it, checks the declaration's ABI and contract versions,
/// runs its registration callback and activates each registered type:
///
/// 1. construct through the type's factory
/// 2. `initialize` with the shared [`HostContext`]
/// 3. register; `shutdown` runs when the host shuts down
pub struct PluginHost {
    root: PathBuf,
    config: PluginsConfig,
    loader: Arc<dyn ModuleLoader>,
    registry: Arc<PluginRegistry>,
    context: Arc<HostContext>,
    scopes: Vec<ModuleScope>,
}

impl PluginHost {
    pub fn new(root: &Path, config: PluginsConfig, loader: Arc<dyn ModuleLoader>) -> Self {
        let registry = Arc::new(PluginRegistry::new());
        let context = Arc::new(HostContext::new(root, Arc::clone(&registry)));
        Self {
            root: root.to_path_buf(),
            config,
            loader,
            registry,
            context,
            scopes: Vec::new(),
        }
    }

    /// Host that maps real shared libraries.
    pub fn native(root: &Path, config: PluginsConfig) -> Self {
        Self::new(root, config, Arc::new(NativeLoader))
    }

    /// Scan the plugin root and activate everything found. Each call
    /// re-scans the disk.
    pub fn load(&mut self) -> DiscoveryReport {
        let discovery = PluginDiscovery::new(self.config.clone(), Arc::clone(&self.loader));
        let discovered = discovery.discover(&self.root, &self.context);
        self.scopes.extend(discovered.scopes);

        let report = discovered.report;
        info!(
            plugins = report.plugins_registered,
            directories = report.directories,
            modules_loaded = report.modules_loaded,
            modules_failed = report.modules_failed,
            activations_failed = report.activations_failed,
            warnings = report.warnings.len(),
            errors = report.errors.len(),
            "loaded {} plugin(s)",
            report.plugins_registered
        );
        report
    }

    /// Registered plugins, in registration order.
    pub fn plugins(&self) -> Vec<Arc<LoadedPlugin>> {
        self.registry.list()
    }

    /// Case-insensitive lookup by plugin name.
    pub fn find(&self, name: &str) -> Option<Arc<LoadedPlugin>> {
        self.registry.find(name)
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn context(&self) -> &Arc<HostContext> {
        &self.context
    }

    pub fn scopes(&self) -> &[ModuleScope] {
        &self.scopes
    }

    /// Plugin root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &PluginsConfig {
        &self.config
    }

    /// Shut every registered plugin down in registration order, clear the
    /// registry and release every scope. Failures are logged and counted;
    /// they never stop the sequence.
    pub fn shutdown(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        // Plugins can still look each other up while shutting down.
        for plugin in self.registry.list() {
            match plugin.shutdown() {
                Ok(()) => {
                    report.shut_down += 1;
                    debug!(plugin = %plugin.name(), scope = %plugin.scope(), "plugin shut down");
                }
                Err(e) => {
                    error!(plugin = %plugin.name(), scope = %plugin.scope(), error = %e, "plugin shutdown failed");
                    let failure = PlugloadError::Teardown {
                        plugin: plugin.name().to_string(),
                        reason: e.to_string(),
                    };
                    report.failed.push(failure.to_string());
                }
            }
        }
        drop(self.registry.drain());

        for mut scope in self.scopes.drain(..) {
            scope.release();
            report.scopes_released += 1;
        }

        info!(
            shut_down = report.shut_down,
            failed = report.failed.len(),
            scopes = report.scopes_released,
            "plugin host shut down"
        );
        report
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        if !self.registry.is_empty() || !self.scopes.is_empty() {
            warn!("plugin host dropped without shutdown, shutting down now");
            self.shutdown();
        }
    }
}
