use std::path::Path;
use std::sync::Arc;

use crate::plugin::Plugin;

/// Severity-tagged log sink handed to plugins. Calls never fail.
pub trait PluginLogger: Send + Sync {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
    fn debug(&self, message: &str);
}

/// Host services available to a plugin from `initialize` until `shutdown`.
///
/// The view is read-only: plugins can list and look up other plugins but
/// cannot register or remove them.
pub trait PluginContext: Send + Sync {
    /// Logger for plugin messages.
    fn logger(&self) -> &dyn PluginLogger;

    /// Root directory the host loads plugins from.
    fn plugin_directory(&self) -> &Path;

    /// Snapshot of the registered plugins, in registration order.
    fn loaded_plugins(&self) -> Vec<Arc<dyn Plugin>>;

    /// Case-insensitive lookup by [`Plugin::name`]. The first registered
    /// match wins when several plugins share a name.
    fn find_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>>;
}
