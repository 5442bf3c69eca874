//! # plugload-bootstrap
//!
//! The library a native host loads to get plugins. It exports two C entry
//! points and nothing else:
//!
//! - `plugload_initialize()`: read `plugload.toml` next to this library,
//!   set up logging, then discover and initialize every plugin under
//!   `<plugin root>/Managed`.
//! - `plugload_shutdown()`: shut every plugin down and release their
//!   module scopes.
//!
//! Neither function returns an error or lets a panic escape. Failures are
//! logged, and written to stderr as `[plugload] ...` when logging itself is
//! unavailable.

pub mod coordinator;
pub mod logging;
pub mod resident;

use std::panic::{AssertUnwindSafe, catch_unwind};

use plugload_contract::panic_message;
use tracing::error;

pub use coordinator::{Bootstrap, BootstrapSettings, Coordinator, Lifecycle, Phase};
pub use logging::LogSink;

static BOOTSTRAP: Bootstrap = Bootstrap::new();

/// The process-wide lifecycle behind the native entry points.
pub fn bootstrap() -> &'static Bootstrap {
    &BOOTSTRAP
}

/// Native entry point: start the plugin system.
#[unsafe(no_mangle)]
pub extern "C" fn plugload_initialize() {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        BOOTSTRAP.initialize(BootstrapSettings::default())
    }));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "plugin system initialize failed");
            eprintln!("[plugload] initialize failed: {e}");
        }
        Err(payload) => {
            eprintln!("[plugload] initialize panicked: {}", panic_message(payload.as_ref()));
        }
    }
}

/// Native entry point: stop the plugin system.
#[unsafe(no_mangle)]
pub extern "C" fn plugload_shutdown() {
    let outcome = catch_unwind(AssertUnwindSafe(|| BOOTSTRAP.shutdown()));
    match outcome {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            error!(error = %e, "plugin system shutdown failed");
            eprintln!("[plugload] shutdown failed: {e}");
        }
        Err(payload) => {
            eprintln!("[plugload] shutdown panicked: {}", panic_message(payload.as_ref()));
        }
    }
}
