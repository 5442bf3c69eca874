use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration, read from `plugload.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlugloadConfig {
    pub plugins: PluginsConfig,
    pub logging: LoggingConfig,
}

// ── Plugins ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Plugin root directory. Unset = the directory the loader library lives in.
    pub root: Option<PathBuf>,
    /// Subdirectory of the root holding one directory per plugin.
    pub managed_dir: String,
    /// File extensions (without the dot) treated as plugin modules.
    pub module_extensions: Vec<String>,
    /// What to do when a plugin's name is already registered.
    pub duplicate_names: DuplicatePolicy,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            root: None,
            managed_dir: "Managed".into(),
            module_extensions: default_module_extensions(),
            duplicate_names: DuplicatePolicy::default(),
        }
    }
}

impl PluginsConfig {
    /// Effective plugin root: the configured root, relative paths taken
    /// against `residence`, or `residence` itself.
    pub fn root_or(&self, residence: &Path) -> PathBuf {
        match &self.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => residence.join(root),
            None => residence.to_path_buf(),
        }
    }

    /// Whether `path` has one of the configured module extensions.
    pub fn is_module_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.module_extensions
                    .iter()
                    .any(|m| m.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
    }
}

/// Policy for plugins whose name is already registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Register anyway and warn; lookups keep returning the first match.
    #[default]
    Shadow,
    /// Refuse the newcomer before its `initialize` runs; it is never
    /// registered and never shut down.
    Reject,
}

/// Shared-library extension of the current platform.
pub fn default_module_extensions() -> Vec<String> {
    let ext = if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    };
    vec![ext.to_string()]
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
    /// Primary log file. Unset = `<plugin root>/Logs/plugload.log`.
    pub file: Option<PathBuf>,
    /// Write to stderr when no log file can be opened.
    pub console_fallback: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
            file: None,
            console_fallback: true,
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
        };
        write!(f, "{}: {}: {}", tag, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, " ({})", h)?;
        }
        Ok(())
    }
}

impl PlugloadConfig {
    /// Validate the config and return a list of warnings.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Managed directory ───
        let managed = &self.plugins.managed_dir;
        if managed.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "plugins.managed_dir".into(),
                message: "managed_dir is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Use a single directory name such as 'Managed'".into()),
            });
        } else if managed.contains('/') || managed.contains('\\') || managed == ".." {
            warnings.push(ConfigWarning {
                field: "plugins.managed_dir".into(),
                message: format!("'{}' is not a single directory name", managed),
                severity: WarningSeverity::Error,
                hint: Some("Nested paths belong in plugins.root".into()),
            });
        }

        // ── Module extensions ───
        if self.plugins.module_extensions.is_empty() {
            warnings.push(ConfigWarning {
                field: "plugins.module_extensions".into(),
                message: "no module extensions configured, nothing would be loaded".into(),
                severity: WarningSeverity::Error,
                hint: Some(format!("Default: {}", default_module_extensions().join(", "))),
            });
        }
        for ext in &self.plugins.module_extensions {
            if ext.starts_with('.') {
                warnings.push(ConfigWarning {
                    field: "plugins.module_extensions".into(),
                    message: format!("extension '{}' has a leading dot", ext),
                    severity: WarningSeverity::Warning,
                    hint: Some("The dot is ignored; write the bare extension".into()),
                });
            }
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
