//! Plugin discovery and activation.
//!
//! Layout: `<root>/<managed_dir>/<PluginDirectory>/<module files>`. Each
//! plugin directory gets its own [`ModuleScope`]; a failure anywhere inside a
//! directory only costs that file or type, never a sibling directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use plugload_config::{DuplicatePolicy, PluginsConfig};
use plugload_contract::{Plugin, PluginContext, guard};
use plugload_core::{DiscoveryReport, PlugloadError};
use tracing::{debug, info};

use crate::context::HostContext;
use crate::loaded::LoadedPlugin;
use crate::scope::{Module, ModuleLoader, ModuleScope, PluginType, is_contract_module};

/// Everything one discovery pass produced.
#[derive(Debug, Default)]
pub struct Discovered {
    /// Initialized plugins, in activation order. Also inserted in the registry.
    pub plugins: Vec<Arc<LoadedPlugin>>,
    /// One scope per plugin directory that could be opened.
    pub scopes: Vec<ModuleScope>,
    pub report: DiscoveryReport,
}

/// Walks the plugin root and activates what it finds.
pub struct PluginDiscovery {
    config: PluginsConfig,
    loader: Arc<dyn ModuleLoader>,
}

impl PluginDiscovery {
    pub fn new(config: PluginsConfig, loader: Arc<dyn ModuleLoader>) -> Self {
        Self { config, loader }
    }

    /// `<root>/<managed_dir>`.
    pub fn managed_directory(&self, plugins_root: &Path) -> PathBuf {
        plugins_root.join(&self.config.managed_dir)
    }

    /// Plugin directories under the managed directory, sorted by name.
    /// Missing directories are reported as a single warning.
    pub fn plugin_directories(&self, plugins_root: &Path, report: &mut DiscoveryReport) -> Vec<PathBuf> {
        if !plugins_root.is_dir() {
            report.record_warning(format!(
                "plugin root not found: {}",
                plugins_root.display()
            ));
            return Vec::new();
        }

        let managed = self.managed_directory(plugins_root);
        if !managed.is_dir() {
            report.record_warning(format!(
                "managed plugin directory not found: {}",
                managed.display()
            ));
            return Vec::new();
        }

        let entries = match std::fs::read_dir(&managed) {
            Ok(entries) => entries,
            Err(e) => {
                report.record_error(format!(
                    "failed to read plugin directory {}: {}",
                    managed.display(),
                    e
                ));
                return Vec::new();
            }
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter(|path| {
                !path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'))
            })
            .collect();
        dirs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        dirs
    }

    /// Discover, load, construct and initialize every plugin under
    /// `plugins_root`. Each initialized plugin is registered right away, so
    /// later plugins can find earlier ones while they initialize.
    pub fn discover(&self, plugins_root: &Path, context: &Arc<HostContext>) -> Discovered {
        let mut out = Discovered::default();
        let directories = self.plugin_directories(plugins_root, &mut out.report);
        info!(root = ?plugins_root, directories = directories.len(), "discovering plugins");

        for directory in directories {
            self.discover_directory(&directory, context, &mut out);
        }
        out
    }

    fn discover_directory(&self, directory: &Path, context: &Arc<HostContext>, out: &mut Discovered) {
        out.report.directories += 1;

        let mut scope = match ModuleScope::create(directory, Arc::clone(&self.loader), &self.config) {
            Ok(scope) => scope,
            Err(e) => {
                out.report.record_error(format!(
                    "skipping plugin directory {}: {}",
                    directory.display(),
                    e
                ));
                return;
            }
        };

        for e in scope.preload() {
            out.report.record_error(format!("scope '{}': {}", scope.name(), e));
        }

        let files = match scope.module_files() {
            Ok(files) => files,
            Err(e) => {
                out.report.record_error(format!(
                    "failed to list modules in {}: {}",
                    directory.display(),
                    e
                ));
                out.scopes.push(scope);
                return;
            }
        };

        if files.is_empty() {
            out.report.record_warning(format!(
                "no plugin modules found in {}",
                directory.display()
            ));
        }

        for file in files {
            if file
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_contract_module)
            {
                debug!(path = ?file, "skipping shared contract module");
                continue;
            }

            let module = match scope.load_module(&file) {
                Ok(module) => module,
                Err(e) => {
                    out.report.modules_failed += 1;
                    out.report.record_error(format!("failed to load module: {e}"));
                    continue;
                }
            };

            let types = match scope.register_plugins(&module) {
                Ok(types) => types,
                Err(e) => {
                    out.report.modules_failed += 1;
                    out.report.record_error(format!("failed to load module: {e}"));
                    continue;
                }
            };
            out.report.modules_loaded += 1;

            if types.is_empty() {
                out.report.record_warning(format!(
                    "{} registered no plugin types",
                    file.display()
                ));
            }

            for ty in types {
                self.activate(&scope, &module, ty, context, out);
            }
        }

        out.scopes.push(scope);
    }

    fn activate(
        &self,
        scope: &ModuleScope,
        module: &Arc<Module>,
        ty: PluginType,
        context: &Arc<HostContext>,
        out: &mut Discovered,
    ) {
        let type_name = ty.type_name;
        let instance = match guard(|| (ty.factory)()) {
            Ok(instance) => instance,
            Err(e) => {
                out.report.activations_failed += 1;
                out.report.record_error(
                    PlugloadError::Activation {
                        plugin: type_name,
                        reason: format!("construction from {} failed: {}", module.path().display(), e),
                    }
                    .to_string(),
                );
                return;
            }
        };

        let plugin = Arc::new(LoadedPlugin::new(
            instance,
            &type_name,
            scope.name(),
            Arc::clone(module),
        ));
        let registry = context.registry();

        if let Some(existing) = registry.find(plugin.name()) {
            match self.config.duplicate_names {
                DuplicatePolicy::Shadow => out.report.record_warning(format!(
                    "plugin name '{}' from scope '{}' is already registered by scope '{}'; lookups return the first",
                    plugin.name(),
                    scope.name(),
                    existing.scope()
                )),
                DuplicatePolicy::Reject => {
                    out.report.activations_failed += 1;
                    out.report.record_warning(format!(
                        "rejected plugin '{}' from scope '{}': name already registered by scope '{}'",
                        plugin.name(),
                        scope.name(),
                        existing.scope()
                    ));
                    return;
                }
            }
        }

        let shared: Arc<dyn PluginContext> = Arc::clone(context) as Arc<dyn PluginContext>;
        if let Err(e) = plugin.initialize(shared) {
            out.report.activations_failed += 1;
            out.report.record_error(
                PlugloadError::Activation {
                    plugin: format!("{} ({})", plugin.name(), type_name),
                    reason: format!("initialize in scope '{}' failed: {}", scope.name(), e),
                }
                .to_string(),
            );
            return;
        }

        registry.add(Arc::clone(&plugin));
        out.report.plugins_registered += 1;
        info!(
            plugin = %plugin.name(),
            version = %plugin.version(),
            scope = %scope.name(),
            "plugin initialized"
        );
        out.plugins.push(plugin);
    }
}
