use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Per-directory manifest: optional `plugin.toml` next to the plugin modules.
///
/// ```toml
/// search_paths = ["deps"]
/// preload = ["greeter"]
///
/// [plugin]
/// name = "versioned-greeter"
/// version = "2.0.0"
///
/// [dependencies]
/// greeter = "deps/libgreeter.so"
///
/// [checksums]
/// "libversioned_greeter.so" = "af1349b9..."
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeManifest {
    #[serde(default)]
    pub plugin: Option<PluginMeta>,
    /// Dependency name → file, relative to the plugin directory.
    #[serde(default)]
    pub dependencies: BTreeMap<String, PathBuf>,
    /// Extra subdirectories searched when resolving dependencies.
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,
    /// Native dependencies mapped before the first module of the directory.
    #[serde(default)]
    pub preload: Vec<String>,
    /// Module file name → BLAKE3 hex digest.
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,
}

/// Display metadata. Not used for loading decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMeta {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
}

impl ScopeManifest {
    pub const FILE_NAME: &'static str = "plugin.toml";

    /// Parse from TOML string.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Read `<dir>/plugin.toml`. A directory without one has no manifest.
    pub fn load(dir: &Path) -> plugload_core::Result<Option<Self>> {
        let path = dir.join(Self::FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        Self::from_toml(&raw)
            .map(Some)
            .map_err(|e| plugload_core::PlugloadError::Manifest {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    /// Expected digest for a module file, if the manifest pins one.
    pub fn checksum_for(&self, file_name: &str) -> Option<&str> {
        self.checksums.get(file_name).map(String::as_str)
    }

    /// Verify a module file's integrity. Files without a pinned digest pass.
    pub fn verify_checksum(&self, file_name: &str, bytes: &[u8]) -> bool {
        match self.checksum_for(file_name) {
            Some(expected) => {
                let actual = blake3::hash(bytes).to_hex();
                actual.as_str().eq_ignore_ascii_case(expected.trim())
            }
            None => true,
        }
    }
}
