use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use plugload_contract::{Plugin, PluginContext, PluginError, guard};
use plugload_core::PluginSummary;

use crate::scope::Module;

/// Lifecycle of one plugin instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Created,
    Initializing,
    Initialized,
    /// `initialize` returned an error or panicked. Terminal.
    Failed,
    ShuttingDown,
    ShutDown,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PluginState::Created => "created",
            PluginState::Initializing => "initializing",
            PluginState::Initialized => "initialized",
            PluginState::Failed => "failed",
            PluginState::ShuttingDown => "shutting down",
            PluginState::ShutDown => "shut down",
        };
        f.write_str(s)
    }
}

/// A plugin instance together with where it came from.
///
/// The record implements [`Plugin`] itself, so the handles given out through
/// the context go through the same lifecycle guards as the host's own calls:
/// `initialize` runs at most once, `shutdown` at most once and only after a
/// successful `initialize`. Panics in linked plugin code come back as
/// [`PluginError::Panicked`]; a separately built module catches its own.
pub struct LoadedPlugin {
    instance: Box<dyn Plugin>,
    type_name: String,
    scope: String,
    state: Mutex<PluginState>,
    // Dropped after `instance`: its code lives in the module.
    module: Arc<Module>,
}

impl LoadedPlugin {
    pub fn new(instance: Box<dyn Plugin>, type_name: &str, scope: &str, module: Arc<Module>) -> Self {
        Self {
            instance,
            type_name: type_name.to_string(),
            scope: scope.to_string(),
            state: Mutex::new(PluginState::Created),
            module,
        }
    }

    pub fn state(&self) -> PluginState {
        *self.state.lock()
    }

    /// Type name the module registered this plugin under.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Name of the module scope (plugin directory) the plugin came from.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn module_path(&self) -> &Path {
        self.module.path()
    }

    pub fn summary(&self) -> PluginSummary {
        PluginSummary {
            name: self.name().to_string(),
            version: self.version().to_string(),
            type_name: self.type_name.clone(),
            scope: self.scope.clone(),
            module: self.module.path().to_path_buf(),
        }
    }

    /// Move from `from` to `via`, or report why the call is refused.
    fn transition(&self, call: &str, from: PluginState, via: PluginState) -> Result<(), PluginError> {
        let current = {
            let mut state = self.state.lock();
            if *state == from {
                *state = via;
                return Ok(());
            }
            *state
        };
        Err(PluginError::Lifecycle(format!(
            "{} cannot {} while {}",
            self.instance.name(),
            call,
            current
        )))
    }
}

impl Plugin for LoadedPlugin {
    fn name(&self) -> &str {
        self.instance.name()
    }

    fn version(&self) -> &str {
        self.instance.version()
    }

    fn initialize(&self, context: Arc<dyn PluginContext>) -> Result<(), PluginError> {
        self.transition("initialize", PluginState::Created, PluginState::Initializing)?;
        let result = guard(|| self.instance.initialize(context));
        *self.state.lock() = if result.is_ok() {
            PluginState::Initialized
        } else {
            PluginState::Failed
        };
        result
    }

    fn shutdown(&self) -> Result<(), PluginError> {
        self.transition("shut down", PluginState::Initialized, PluginState::ShuttingDown)?;
        let result = guard(|| self.instance.shutdown());
        *self.state.lock() = PluginState::ShutDown;
        result
    }
}

impl fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("name", &self.name())
            .field("type_name", &self.type_name)
            .field("scope", &self.scope)
            .field("state", &self.state())
            .finish()
    }
}
