use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::PlugloadConfig;

/// Loads the loader configuration.
pub struct ConfigLoader {
    config: PlugloadConfig,
    config_path: PathBuf,
    warnings: Vec<String>,
}

impl ConfigLoader {
    pub const FILE_NAME: &'static str = "plugload.toml";

    /// Resolve the config path: explicit path > PLUGLOAD_CONFIG env > `<residence>/plugload.toml`
    pub fn resolve_path(explicit: Option<&Path>, residence: &Path) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("PLUGLOAD_CONFIG") {
            return PathBuf::from(p);
        }
        residence.join(Self::FILE_NAME)
    }

    /// Load the config from disk, falling back to defaults when the file is absent.
    pub fn load(path: Option<&Path>, residence: &Path) -> plugload_core::Result<Self> {
        Self::load_with(path, residence, |key| std::env::var(key).ok())
    }

    /// Like [`load`](Self::load), reading overrides through `env` instead of the process environment.
    pub fn load_with(
        path: Option<&Path>,
        residence: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> plugload_core::Result<Self> {
        let config_path = Self::resolve_path(path, residence);
        let mut warnings = Vec::new();

        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw, &config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            warnings.push(format!(
                "config file not found: {}, using defaults",
                config_path.display()
            ));
            PlugloadConfig::default()
        };

        let config = Self::apply_env_overrides(config, env);

        // Validate: keep warnings, fail on errors
        match config.validate() {
            Ok(found) => {
                for w in &found {
                    warn!("{}", w);
                    warnings.push(w.to_string());
                }
            }
            Err(e) => {
                return Err(plugload_core::PlugloadError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
            warnings,
        })
    }

    /// Parse a config document. `origin` only labels errors.
    pub fn parse(raw: &str, origin: &Path) -> plugload_core::Result<PlugloadConfig> {
        toml::from_str::<PlugloadConfig>(raw).map_err(|e| {
            plugload_core::PlugloadError::Config(format!(
                "failed to parse {}: {}",
                origin.display(),
                e
            ))
        })
    }

    /// Consume the loader, keeping the configuration.
    pub fn into_config(self) -> PlugloadConfig {
        self.config
    }

    /// Path the config was (or would have been) read from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Warnings collected while loading. Loading usually happens before a log
    /// subscriber exists, so callers replay these once logging is up.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Apply env var overrides (PLUGLOAD_PLUGIN_ROOT, PLUGLOAD_LOG_LEVEL, PLUGLOAD_LOG_FORMAT)
    fn apply_env_overrides(
        mut config: PlugloadConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> PlugloadConfig {
        if let Some(v) = env("PLUGLOAD_PLUGIN_ROOT") {
            if !v.is_empty() {
                config.plugins.root = Some(PathBuf::from(v));
            }
        }
        if let Some(v) = env("PLUGLOAD_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Some(v) = env("PLUGLOAD_LOG_FORMAT") {
            config.logging.format = v;
        }
        config
    }
}
