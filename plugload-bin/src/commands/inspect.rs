use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use console::style;
use plugload_config::PlugloadConfig;
use plugload_core::{DiscoveryReport, Result};
use plugload_host::{ModuleScope, NativeLoader, PluginDiscovery, ScopeManifest, is_contract_module};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ScopeInspection {
    name: String,
    directory: PathBuf,
    /// `name vX` from `[plugin]`, if the manifest has one.
    title: Option<String>,
    has_manifest: bool,
    modules: Vec<ModuleFile>,
    dependencies: Vec<Resolution>,
    preload: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ModuleFile {
    file: String,
    /// Would be skipped: the contract always comes from the host.
    contract: bool,
    checksum: ChecksumStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum ChecksumStatus {
    Unlisted,
    Ok,
    Mismatch,
}

#[derive(Debug, Serialize)]
struct Resolution {
    name: String,
    resolved: Option<PathBuf>,
}

pub(super) fn cmd_inspect(config: &PlugloadConfig, dir: &Path, resolve: &[String], json: bool) -> Result<()> {
    let mut report = DiscoveryReport::default();
    let directories = plugin_directories(config, dir, &mut report)?;
    debug!(dir = %dir.display(), scopes = directories.len(), "inspecting plugin directories");
    let scopes = directories
        .iter()
        .map(|d| inspect_scope(config, d, resolve))
        .collect::<Result<Vec<_>>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&scopes)?);
        return Ok(());
    }

    for w in &report.warnings {
        println!("{} {w}", style("warning:").yellow());
    }
    if scopes.is_empty() {
        println!("No plugin directories under {}.", dir.display());
    }
    for scope in &scopes {
        print_scope(scope);
    }
    Ok(())
}

/// `dir` may be a plugin root (has a Managed subdirectory), a plugin
/// directory (has module files or a manifest) or a Managed directory.
fn plugin_directories(config: &PlugloadConfig, dir: &Path, report: &mut DiscoveryReport) -> Result<Vec<PathBuf>> {
    let discovery = PluginDiscovery::new(config.plugins.clone(), Arc::new(NativeLoader));
    if discovery.managed_directory(dir).is_dir() {
        return Ok(discovery.plugin_directories(dir, report));
    }

    let entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();

    let is_plugin_dir = dir.join(ScopeManifest::FILE_NAME).is_file()
        || entries.iter().any(|p| p.is_file() && config.plugins.is_module_file(p));
    if is_plugin_dir {
        return Ok(vec![dir.to_path_buf()]);
    }

    let mut dirs: Vec<PathBuf> = entries
        .into_iter()
        .filter(|p| p.is_dir())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with('.'))
        })
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn inspect_scope(config: &PlugloadConfig, dir: &Path, resolve: &[String]) -> Result<ScopeInspection> {
    let scope = ModuleScope::create(dir, Arc::new(NativeLoader), &config.plugins)?;
    let manifest = scope.manifest();

    let files = scope
        .module_files()
        .with_context(|| format!("cannot list modules in {}", dir.display()))?;
    let mut modules = Vec::with_capacity(files.len());
    for path in &files {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let checksum = match manifest.filter(|m| m.checksum_for(&file).is_some()) {
            None => ChecksumStatus::Unlisted,
            Some(m) => {
                let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
                if m.verify_checksum(&file, &bytes) {
                    ChecksumStatus::Ok
                } else {
                    ChecksumStatus::Mismatch
                }
            }
        };
        modules.push(ModuleFile {
            contract: is_contract_module(&file),
            file,
            checksum,
        });
    }

    // Declared dependencies first, then the ones asked for on the command line.
    let mut names: Vec<String> = manifest
        .map(|m| m.dependencies.keys().cloned().collect())
        .unwrap_or_default();
    for name in resolve {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    let dependencies = names
        .into_iter()
        .map(|name| Resolution {
            resolved: scope.resolve_dependency(&name),
            name,
        })
        .collect();

    Ok(ScopeInspection {
        name: scope.name().to_string(),
        directory: scope.directory().to_path_buf(),
        title: manifest
            .and_then(|m| m.plugin.as_ref())
            .map(|p| format!("{} v{}", p.name, p.version)),
        has_manifest: manifest.is_some(),
        modules,
        dependencies,
        preload: manifest.map(|m| m.preload.clone()).unwrap_or_default(),
    })
}

fn print_scope(scope: &ScopeInspection) {
    match &scope.title {
        Some(title) => println!("{} ({})", style(&scope.name).bold(), title),
        None => println!("{}", style(&scope.name).bold()),
    }
    println!("  {}", scope.directory.display());
    if !scope.has_manifest {
        println!("  no {}", ScopeManifest::FILE_NAME);
    }

    if scope.modules.is_empty() {
        println!("  {} no module files", style("warning:").yellow());
    }
    for m in &scope.modules {
        let note = if m.contract {
            style(" [contract, skipped]").dim().to_string()
        } else {
            match m.checksum {
                ChecksumStatus::Unlisted => String::new(),
                ChecksumStatus::Ok => style(" [checksum ok]").green().to_string(),
                ChecksumStatus::Mismatch => style(" [checksum mismatch]").red().to_string(),
            }
        };
        println!("  module {}{note}", m.file);
    }

    for d in &scope.dependencies {
        match &d.resolved {
            Some(path) => println!("  dependency {} -> {}", d.name, path.display()),
            None => println!("  dependency {} -> {}", d.name, style("host default lookup").dim()),
        }
    }
    if !scope.preload.is_empty() {
        println!("  preload {}", scope.preload.join(", "));
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PlugloadConfig {
        let mut config = PlugloadConfig::default();
        config.plugins.module_extensions = vec!["so".into()];
        config
    }

    fn touch(path: &Path, contents: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn root_lists_managed_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("Managed/Beta/libbeta.so"), b"");
        touch(&dir.path().join("Managed/Alpha/libalpha.so"), b"");

        let mut report = DiscoveryReport::default();
        let dirs = plugin_directories(&config(), dir.path(), &mut report).unwrap();
        let names: Vec<_> = dirs.iter().map(|d| d.file_name().unwrap().to_owned()).collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn plugin_directory_is_its_own_scope() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("libalpha.so"), b"");

        let mut report = DiscoveryReport::default();
        let dirs = plugin_directories(&config(), dir.path(), &mut report).unwrap();
        assert_eq!(dirs, vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn managed_directory_lists_children() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("Greeter/libgreeter_plugin.so"), b"");
        std::fs::create_dir_all(dir.path().join(".cache")).unwrap();

        let mut report = DiscoveryReport::default();
        let dirs = plugin_directories(&config(), dir.path(), &mut report).unwrap();
        assert_eq!(dirs, vec![dir.path().join("Greeter")]);
    }

    #[test]
    fn scope_shows_contract_checksums_and_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = dir.path().join("Greeter");
        let module = b"module bytes";
        touch(&plugin.join("libgreeter_plugin.so"), module);
        touch(&plugin.join("libplugload_contract.so"), b"");
        touch(&plugin.join("deps/libgreeter.so"), b"");
        touch(
            &plugin.join("plugin.toml"),
            format!(
                "search_paths = [\"deps\"]\n\n[plugin]\nname = \"greeter\"\nversion = \"2.0.0\"\n\n[checksums]\n\"libgreeter_plugin.so\" = \"{}\"\n",
                blake3_hex(module)
            )
            .as_bytes(),
        );

        let inspection = inspect_scope(&config(), &plugin, &["greeter".into(), "missing".into()]).unwrap();
        assert_eq!(inspection.name, "Greeter");
        assert_eq!(inspection.title.as_deref(), Some("greeter v2.0.0"));

        let contract = inspection
            .modules
            .iter()
            .find(|m| m.file == "libplugload_contract.so")
            .unwrap();
        assert!(contract.contract);
        let main = inspection
            .modules
            .iter()
            .find(|m| m.file == "libgreeter_plugin.so")
            .unwrap();
        assert!(!main.contract);
        assert_eq!(main.checksum, ChecksumStatus::Ok);

        assert_eq!(inspection.dependencies.len(), 2);
        assert_eq!(
            inspection.dependencies[0].resolved,
            Some(plugin.join("deps").join("libgreeter.so"))
        );
        assert!(inspection.dependencies[1].resolved.is_none());
    }

    #[test]
    fn checksum_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("liba.so"), b"actual");
        touch(&dir.path().join("plugin.toml"), b"[checksums]\n\"liba.so\" = \"00ff\"\n");

        let inspection = inspect_scope(&config(), dir.path(), &[]).unwrap();
        assert_eq!(inspection.modules[0].checksum, ChecksumStatus::Mismatch);
        assert!(inspection.has_manifest);
        assert!(inspection.title.is_none());
    }

    #[test]
    fn inspect_command_accepts_every_directory_kind() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("Managed/Alpha/libalpha.so"), b"");

        cmd_inspect(&config(), dir.path(), &["zlib".into()], true).unwrap();
        cmd_inspect(&config(), &dir.path().join("Managed"), &[], false).unwrap();
        cmd_inspect(&config(), &dir.path().join("Managed/Alpha"), &[], false).unwrap();
        assert!(cmd_inspect(&config(), &dir.path().join("absent"), &[], false).is_err());
    }

    fn blake3_hex(bytes: &[u8]) -> String {
        blake3::hash(bytes).to_hex().to_string()
    }
}
