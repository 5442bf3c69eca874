use std::sync::Arc;

use parking_lot::RwLock;
use plugload_contract::Plugin;
use plugload_core::PluginSummary;

use crate::loaded::LoadedPlugin;

/// Insertion-ordered set of initialized plugins.
///
/// Reads are safe from any thread. Only the host adds and removes entries;
/// plugins see the registry through [`PluginContext`](plugload_contract::PluginContext).
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: RwLock<Vec<Arc<LoadedPlugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, plugin: Arc<LoadedPlugin>) {
        self.plugins.write().push(plugin);
    }

    /// Remove every entry, returning them in insertion order.
    pub(crate) fn drain(&self) -> Vec<Arc<LoadedPlugin>> {
        std::mem::take(&mut *self.plugins.write())
    }

    /// Snapshot of all plugins, in insertion order.
    pub fn list(&self) -> Vec<Arc<LoadedPlugin>> {
        self.plugins.read().clone()
    }

    /// Case-insensitive lookup by name. The first inserted match wins.
    pub fn find(&self, name: &str) -> Option<Arc<LoadedPlugin>> {
        let wanted = name.to_lowercase();
        self.plugins
            .read()
            .iter()
            .find(|p| p.name().to_lowercase() == wanted)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.plugins.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.read().is_empty()
    }

    pub fn summaries(&self) -> Vec<PluginSummary> {
        self.plugins.read().iter().map(|p| p.summary()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Module;
    use plugload_contract::{PluginContext, PluginDeclaration, PluginError, PluginRegistrar};
    use std::path::Path;

    struct Named(&'static str);

    impl Plugin for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        fn initialize(&self, _context: Arc<dyn PluginContext>) -> Result<(), PluginError> {
            Ok(())
        }
        fn shutdown(&self) -> Result<(), PluginError> {
            Ok(())
        }
    }

    fn no_types(_: &mut dyn PluginRegistrar) {}

    fn entry(name: &'static str, scope: &str) -> Arc<LoadedPlugin> {
        let module = Arc::new(Module::linked(
            Path::new("module.plug"),
            PluginDeclaration::new(no_types),
        ));
        Arc::new(LoadedPlugin::new(Box::new(Named(name)), name, scope, module))
    }

    #[test]
    fn empty_registry() {
        let registry = PluginRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.find("anything").is_none());
        assert!(registry.drain().is_empty());
    }

    #[test]
    fn find_is_case_insensitive() {
        let registry = PluginRegistry::new();
        registry.add(entry("Foo", "A"));

        let upper = registry.find("FOO").unwrap();
        let lower = registry.find("foo").unwrap();
        assert!(Arc::ptr_eq(&upper, &lower));
        assert!(registry.contains("fOo"));
        assert!(!registry.contains("fo"));
    }

    #[test]
    fn find_handles_unicode_case() {
        let registry = PluginRegistry::new();
        registry.add(entry("Größe", "A"));
        assert!(registry.contains("größe"));
        assert!(registry.contains("GRÖßE"));
    }

    #[test]
    fn first_inserted_match_wins() {
        let registry = PluginRegistry::new();
        registry.add(entry("Dup", "First"));
        registry.add(entry("dup", "Second"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.find("DUP").unwrap().scope(), "First");

        let scopes: Vec<_> = registry.list().iter().map(|p| p.scope().to_string()).collect();
        assert_eq!(scopes, vec!["First", "Second"]);
    }

    #[test]
    fn drain_empties_in_order() {
        let registry = PluginRegistry::new();
        registry.add(entry("A", "A"));
        registry.add(entry("B", "B"));

        let drained: Vec<_> = registry.drain().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(drained, vec!["A", "B"]);
        assert!(registry.is_empty());
    }
}
