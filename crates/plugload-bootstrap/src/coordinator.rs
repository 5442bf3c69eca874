use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use plugload_config::{ConfigLoader, PlugloadConfig};
use plugload_core::{DiscoveryReport, PlugloadError, PluginSummary, Result, RuntimeInfo, ShutdownReport};
use plugload_host::{ModuleLoader, NativeLoader, PluginHost};
use tracing::{debug, error, info, warn};

use crate::logging::{self, LogSink};
use crate::resident;

/// Inputs of one `initialize`. The defaults are what the native entry point uses.
#[derive(Clone)]
pub struct BootstrapSettings {
    /// Explicit config file; otherwise `PLUGLOAD_CONFIG` or `<residence>/plugload.toml`.
    pub config_path: Option<PathBuf>,
    /// Directory the loader lives in; looked up from the loaded module when unset.
    pub residence: Option<PathBuf>,
    /// Overrides `plugins.root` from the config.
    pub plugin_root: Option<PathBuf>,
    /// Install the global `tracing` subscriber.
    pub install_logging: bool,
    /// Module loader; [`NativeLoader`] when unset.
    pub loader: Option<Arc<dyn ModuleLoader>>,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            config_path: None,
            residence: None,
            plugin_root: None,
            install_logging: true,
            loader: None,
        }
    }
}

impl std::fmt::Debug for BootstrapSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapSettings")
            .field("config_path", &self.config_path)
            .field("residence", &self.residence)
            .field("plugin_root", &self.plugin_root)
            .field("install_logging", &self.install_logging)
            .field("custom_loader", &self.loader.is_some())
            .finish()
    }
}

/// The live plugin system between `initialize` and `shutdown`.
pub struct Coordinator {
    host: PluginHost,
    config: PlugloadConfig,
    report: DiscoveryReport,
    sink: Option<LogSink>,
}

impl Coordinator {
    /// Load config, set up logging, discover and activate plugins.
    pub fn start(settings: BootstrapSettings) -> Result<Self> {
        let residence = match settings.residence {
            Some(dir) => dir,
            None => resident::residence()?,
        };

        let loaded = ConfigLoader::load(settings.config_path.as_deref(), &residence)?;
        let config_path = loaded.path().to_path_buf();
        let config_warnings = loaded.warnings().to_vec();
        let config = loaded.into_config();

        let root = match settings.plugin_root {
            Some(root) => root,
            None => config.plugins.root_or(&residence),
        };

        let sink = if settings.install_logging {
            Some(logging::install(&config.logging, &root)?)
        } else {
            None
        };

        log_banner(&RuntimeInfo::current(), &residence, &root, &config_path, sink.as_ref());
        for warning in &config_warnings {
            warn!("{warning}");
        }

        let loader = settings.loader.unwrap_or_else(|| Arc::new(NativeLoader));
        let mut host = PluginHost::new(&root, config.plugins.clone(), loader);
        let report = host.load();

        for plugin in host.plugins() {
            let summary = plugin.summary();
            info!(
                plugin = %summary.name,
                version = %summary.version,
                scope = %summary.scope,
                "  {} v{}",
                summary.name,
                summary.version
            );
        }

        Ok(Self {
            host,
            config,
            report,
            sink,
        })
    }

    /// Shut every plugin down and release every module scope.
    pub fn stop(mut self) -> ShutdownReport {
        info!(plugins = self.host.registry().len(), "shutting down plugin system");
        self.host.shutdown()
    }

    pub fn host(&self) -> &PluginHost {
        &self.host
    }

    pub fn config(&self) -> &PlugloadConfig {
        &self.config
    }

    /// Report of the discovery pass run by [`start`](Self::start).
    pub fn report(&self) -> &DiscoveryReport {
        &self.report
    }

    /// Log sink installed by `start`, if logging was requested.
    pub fn log_sink(&self) -> Option<&LogSink> {
        self.sink.as_ref()
    }
}

fn log_banner(
    runtime: &RuntimeInfo,
    residence: &Path,
    root: &Path,
    config_path: &Path,
    sink: Option<&LogSink>,
) {
    info!(
        version = %runtime.loader_version,
        os = ?runtime.os,
        arch = ?runtime.arch,
        pointer_width = runtime.pointer_width,
        "plugload starting"
    );
    if !runtime.is_64bit() {
        warn!(pointer_width = runtime.pointer_width, "running in a 32-bit process");
    }
    info!(residence = ?residence, root = ?root, config = ?config_path, sink = ?sink, "plugin system paths");
}

// ── Lifecycle ──────────────────────────────────────────────────

/// Process-wide state of the plugin system. `ShutDown` is terminal.
pub enum Lifecycle {
    Uninitialized,
    Initialized(Coordinator),
    ShutDown,
}

/// Observable phase of a [`Bootstrap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initialized,
    ShutDown,
}

impl Lifecycle {
    pub fn phase(&self) -> Phase {
        match self {
            Lifecycle::Uninitialized => Phase::Uninitialized,
            Lifecycle::Initialized(_) => Phase::Initialized,
            Lifecycle::ShutDown => Phase::ShutDown,
        }
    }
}

/// Guards the [`Lifecycle`]. Calls never wait: one that overlaps another
/// (including a plugin calling back in from its own `initialize`) fails
/// with [`PlugloadError::Busy`].
pub struct Bootstrap {
    state: Mutex<Lifecycle>,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new()
    }
}

impl Bootstrap {
    pub const fn new() -> Self {
        Self {
            state: parking_lot::const_mutex(Lifecycle::Uninitialized),
        }
    }

    /// Start the plugin system. A second call before `shutdown` fails with
    /// [`PlugloadError::AlreadyInitialized`] and leaves the live system alone;
    /// any call after `shutdown` fails with [`PlugloadError::AlreadyShutDown`].
    pub fn initialize(&self, settings: BootstrapSettings) -> Result<()> {
        let mut state = self.state.try_lock().ok_or(PlugloadError::Busy)?;
        match &*state {
            Lifecycle::Initialized(_) => return Err(PlugloadError::AlreadyInitialized),
            Lifecycle::ShutDown => return Err(PlugloadError::AlreadyShutDown),
            Lifecycle::Uninitialized => {}
        }

        let coordinator = Coordinator::start(settings)?;
        *state = Lifecycle::Initialized(coordinator);
        Ok(())
    }

    /// Stop the plugin system. Without a live system this is a no-op that
    /// returns `None`.
    pub fn shutdown(&self) -> Result<Option<ShutdownReport>> {
        let mut state = self.state.try_lock().ok_or(PlugloadError::Busy)?;
        match std::mem::replace(&mut *state, Lifecycle::ShutDown) {
            Lifecycle::Initialized(coordinator) => {
                let report = coordinator.stop();
                if !report.failed.is_empty() {
                    error!(failed = report.failed.len(), "some plugins failed to shut down");
                }
                Ok(Some(report))
            }
            Lifecycle::Uninitialized => {
                *state = Lifecycle::Uninitialized;
                debug!("shutdown requested before initialize, nothing to do");
                Ok(None)
            }
            Lifecycle::ShutDown => {
                debug!("plugin system already shut down");
                Ok(None)
            }
        }
    }

    pub fn phase(&self) -> Result<Phase> {
        let state = self.state.try_lock().ok_or(PlugloadError::Busy)?;
        Ok(state.phase())
    }

    /// Summaries of the registered plugins; empty unless initialized.
    pub fn plugins(&self) -> Result<Vec<PluginSummary>> {
        let state = self.state.try_lock().ok_or(PlugloadError::Busy)?;
        Ok(match &*state {
            Lifecycle::Initialized(coordinator) => coordinator.host().registry().summaries(),
            _ => Vec::new(),
        })
    }

    /// Run `f` against the live coordinator.
    pub fn with_coordinator<R>(&self, f: impl FnOnce(&Coordinator) -> R) -> Result<Option<R>> {
        let state = self.state.try_lock().ok_or(PlugloadError::Busy)?;
        Ok(match &*state {
            Lifecycle::Initialized(coordinator) => Some(f(coordinator)),
            _ => None,
        })
    }
}
