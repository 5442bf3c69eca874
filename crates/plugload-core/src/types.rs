use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, warn};

/// Public description of a registered plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSummary {
    pub name: String,
    pub version: String,
    /// Type name the module registered the plugin under.
    pub type_name: String,
    /// Plugin directory (module scope) the plugin was loaded from.
    pub scope: String,
    pub module: PathBuf,
}

/// Outcome of one discovery pass.
///
/// Every warning and error that discovery logs is also recorded here, so
/// callers can summarize a pass without scraping log output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub directories: usize,
    pub modules_loaded: usize,
    pub modules_failed: usize,
    pub activations_failed: usize,
    pub plugins_registered: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl DiscoveryReport {
    /// Log a warning and keep it in the report.
    pub fn record_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }

    /// Log an error and keep it in the report.
    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{message}");
        self.errors.push(message);
    }
}

/// Outcome of tearing the plugin system down.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShutdownReport {
    pub shut_down: usize,
    /// One `plugin shutdown failed: plugin: reason` line per failed shutdown.
    pub failed: Vec<String>,
    pub scopes_released: usize,
}

/// Process facts logged when the loader starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub loader_version: String,
    pub os: Os,
    pub arch: Arch,
    pub pointer_width: u32,
}

impl RuntimeInfo {
    pub fn current() -> Self {
        Self {
            loader_version: env!("CARGO_PKG_VERSION").to_string(),
            os: Os::current(),
            arch: Arch::current(),
            pointer_width: usize::BITS,
        }
    }

    pub fn is_64bit(&self) -> bool {
        self.pointer_width == 64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    MacOS,
    Windows,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86_64,
    X86,
    Aarch64,
    Arm,
    Other,
}

impl Os {
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Os::Linux
        } else if cfg!(target_os = "macos") {
            Os::MacOS
        } else if cfg!(target_os = "windows") {
            Os::Windows
        } else {
            Os::Other
        }
    }
}

impl Arch {
    pub fn current() -> Self {
        if cfg!(target_arch = "x86_64") {
            Arch::X86_64
        } else if cfg!(target_arch = "x86") {
            Arch::X86
        } else if cfg!(target_arch = "aarch64") {
            Arch::Aarch64
        } else if cfg!(target_arch = "arm") {
            Arch::Arm
        } else {
            Arch::Other
        }
    }
}
