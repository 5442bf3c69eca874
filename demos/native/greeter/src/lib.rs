//! A plain native library with a C ABI. Build it twice with different
//! versions (bump the package version, or set `GREETER_VERSION` at build
//! time) to see two plugin directories each resolve their own copy.

use std::ffi::{CString, c_char};
use std::sync::OnceLock;

const VERSION: &str = match option_env!("GREETER_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

static VERSION_C: OnceLock<CString> = OnceLock::new();

/// NUL-terminated version of this build. Lives as long as the library.
#[unsafe(no_mangle)]
pub extern "C" fn greeter_version() -> *const c_char {
    VERSION_C
        .get_or_init(|| CString::new(VERSION).unwrap_or_default())
        .as_ptr()
}
