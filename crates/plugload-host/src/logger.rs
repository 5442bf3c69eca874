use plugload_contract::PluginLogger;
use tracing::{debug, error, info, warn};

/// Forwards plugin log calls to `tracing` under the `plugload::plugin` target.
#[derive(Debug, Clone, Default)]
pub struct TracingPluginLogger;

impl PluginLogger for TracingPluginLogger {
    fn info(&self, message: &str) {
        info!(target: "plugload::plugin", "{message}");
    }

    fn warning(&self, message: &str) {
        warn!(target: "plugload::plugin", "{message}");
    }

    fn error(&self, message: &str) {
        error!(target: "plugload::plugin", "{message}");
    }

    fn debug(&self, message: &str) {
        debug!(target: "plugload::plugin", "{message}");
    }
}
