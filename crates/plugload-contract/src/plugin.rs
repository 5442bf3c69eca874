use std::sync::Arc;

use crate::context::PluginContext;
use crate::error::PluginError;

/// Trait implemented by every activatable plugin type.
///
/// The host calls [`initialize`](Plugin::initialize) at most once per
/// instance and [`shutdown`](Plugin::shutdown) at most once, only after a
/// successful `initialize`. Both take `&self`: an instance is shared with
/// other plugins through [`PluginContext`], so mutable state lives behind the
/// plugin's own synchronization.
pub trait Plugin: Send + Sync {
    /// Name used for lookup. Not required to be unique.
    fn name(&self) -> &str;

    /// Informational version string.
    fn version(&self) -> &str;

    /// Called once after construction with the host context.
    fn initialize(&self, context: Arc<dyn PluginContext>) -> Result<(), PluginError>;

    /// Called once when the host is shutting down.
    fn shutdown(&self) -> Result<(), PluginError>;
}
