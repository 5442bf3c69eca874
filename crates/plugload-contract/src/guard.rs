//! Panic containment inside the plugin module.
//!
//! A separately built module links its own copy of the standard library. A
//! panic unwinding out of module code into the host is a foreign exception
//! there: the host cannot catch it and the process aborts. Every entry point
//! the host calls therefore catches panics on the module's side and hands
//! back a [`PluginError::Panicked`] instead.
//!
//! [`export_plugin!`](crate::export_plugin) guards the registration callback
//! and [`factory`](crate::factory) guards construction and wraps the instance
//! in [`Guarded`]. A module that registers a hand-written factory does the
//! same with [`guard`] and [`Guarded::boxed`].

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::context::PluginContext;
use crate::declaration::PluginRegistrar;
use crate::error::PluginError;
use crate::plugin::Plugin;

/// Run plugin code, turning a panic into [`PluginError::Panicked`].
pub fn guard<T>(call: impl FnOnce() -> Result<T, PluginError>) -> Result<T, PluginError> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(PluginError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A plugin whose every method catches its own panics.
pub struct Guarded<P>(P);

impl<P: Plugin + 'static> Guarded<P> {
    pub fn new(plugin: P) -> Self {
        Self(plugin)
    }

    /// Wrapped and boxed, ready to return from a factory.
    pub fn boxed(plugin: P) -> Box<dyn Plugin> {
        Box::new(Self(plugin))
    }

    pub fn get_ref(&self) -> &P {
        &self.0
    }
}

impl<P: Plugin> Plugin for Guarded<P> {
    fn name(&self) -> &str {
        catch_unwind(AssertUnwindSafe(|| self.0.name())).unwrap_or("<panicked>")
    }

    fn version(&self) -> &str {
        catch_unwind(AssertUnwindSafe(|| self.0.version())).unwrap_or("<panicked>")
    }

    fn initialize(&self, context: Arc<dyn PluginContext>) -> Result<(), PluginError> {
        guard(|| self.0.initialize(context))
    }

    fn shutdown(&self) -> Result<(), PluginError> {
        guard(|| self.0.shutdown())
    }
}

/// Run a registration callback, reporting a panic to the registrar.
#[doc(hidden)]
pub fn register_guarded(registrar: &mut dyn PluginRegistrar, register: fn(&mut dyn PluginRegistrar)) {
    let outcome = catch_unwind(AssertUnwindSafe(|| register(&mut *registrar)));
    if let Err(payload) = outcome {
        registrar.registration_failed(&panic_message(payload.as_ref()));
    }
}
