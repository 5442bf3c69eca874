#[cfg(test)]
mod tests {
    use plugload_contract::{
        Guarded, Plugin, PluginContext, PluginError, PluginFactory, PluginLogger, PluginRegistrar, factory, guard,
        panic_message,
    };
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    // ── Test plugins ───────────────────────────────────────────

    #[derive(Default)]
    struct Explosive;

    impl Plugin for Explosive {
        fn name(&self) -> &str {
            "Explosive"
        }
        fn version(&self) -> &str {
            panic!("no version today")
        }
        fn initialize(&self, _context: Arc<dyn PluginContext>) -> Result<(), PluginError> {
            panic!("initialize blew up")
        }
        fn shutdown(&self) -> Result<(), PluginError> {
            Err(PluginError::Shutdown("stuck".into()))
        }
    }

    struct Unbuildable;

    impl Default for Unbuildable {
        fn default() -> Self {
            panic!("cannot build")
        }
    }

    impl Plugin for Unbuildable {
        fn name(&self) -> &str {
            "Unbuildable"
        }
        fn version(&self) -> &str {
            "0.0.0"
        }
        fn initialize(&self, _context: Arc<dyn PluginContext>) -> Result<(), PluginError> {
            Ok(())
        }
        fn shutdown(&self) -> Result<(), PluginError> {
            Ok(())
        }
    }

    struct Quiet;

    impl PluginLogger for Quiet {
        fn info(&self, _: &str) {}
        fn warning(&self, _: &str) {}
        fn error(&self, _: &str) {}
        fn debug(&self, _: &str) {}
    }

    struct EmptyContext;

    impl PluginContext for EmptyContext {
        fn logger(&self) -> &dyn PluginLogger {
            &Quiet
        }
        fn plugin_directory(&self) -> &Path {
            Path::new("/plugins")
        }
        fn loaded_plugins(&self) -> Vec<Arc<dyn Plugin>> {
            Vec::new()
        }
        fn find_plugin(&self, _name: &str) -> Option<Arc<dyn Plugin>> {
            None
        }
    }

    #[derive(Default)]
    struct Collect {
        names: Vec<String>,
        factories: Vec<PluginFactory>,
        failure: Option<String>,
    }

    impl PluginRegistrar for Collect {
        fn register_plugin(&mut self, type_name: &str, factory: PluginFactory) {
            self.names.push(type_name.to_string());
            self.factories.push(factory);
        }

        fn resolve_dependency(&self, _name: &str) -> Option<PathBuf> {
            None
        }

        fn registration_failed(&mut self, message: &str) {
            self.failure = Some(message.to_string());
        }
    }

    // ── Registration ───────────────────────────────────────────

    mod half_registered {
        use super::*;

        fn register(registrar: &mut dyn PluginRegistrar) {
            registrar.register_plugin("Explosive", factory::<Explosive>());
            panic!("registration gave up");
        }

        plugload_contract::export_plugin!(register);
    }

    #[test]
    fn exported_registration_reports_panics() {
        let mut collect = Collect::default();
        (half_registered::PLUGLOAD_PLUGIN_DECLARATION.register)(&mut collect);

        assert_eq!(collect.names, vec!["Explosive"]);
        assert_eq!(collect.failure.as_deref(), Some("registration gave up"));
    }

    // ── Factories and instances ────────────────────────────────

    #[test]
    fn default_factory_contains_constructor_panics() {
        let build = factory::<Unbuildable>();
        match build() {
            Err(PluginError::Panicked(message)) => assert_eq!(message, "cannot build"),
            other => panic!("unexpected: {:?}", other.map(|p| p.name().to_string())),
        }
    }

    #[test]
    fn default_factory_instances_contain_method_panics() {
        let plugin = factory::<Explosive>()().unwrap();
        assert_eq!(plugin.name(), "Explosive");
        assert_eq!(plugin.version(), "<panicked>");

        match plugin.initialize(Arc::new(EmptyContext)) {
            Err(PluginError::Panicked(message)) => assert!(message.contains("initialize blew up")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(plugin.shutdown(), Err(PluginError::Shutdown(_))));
    }

    #[test]
    fn hand_written_factory_with_guard() {
        let flaky: PluginFactory = Box::new(|| {
            guard(|| {
                let threshold: u32 = "not a number".parse().expect("threshold is numeric");
                assert!(threshold > 0);
                Ok(Guarded::boxed(Explosive))
            })
        });
        match flaky() {
            Err(PluginError::Panicked(message)) => assert!(message.contains("threshold is numeric")),
            other => panic!("unexpected: {:?}", other.map(|p| p.name().to_string())),
        }
    }

    #[test]
    fn guarded_keeps_the_inner_plugin() {
        let guarded = Guarded::new(Explosive);
        assert_eq!(guarded.get_ref().name(), "Explosive");
        assert!(guard(|| guarded.initialize(Arc::new(EmptyContext))).is_err());
    }

    #[test]
    fn panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic payload");
    }
}
