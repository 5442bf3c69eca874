//! Module scopes: one dependency-isolated loading context per plugin directory.
//!
//! Every library a scope maps is opened by its full resolved path with local
//! symbol visibility, so two scopes that bundle same-named libraries at
//! different versions each map their own file. The shared capability contract
//! is never resolved from a plugin directory: plugins link against the copy
//! the host was built with.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use plugload_config::PluginsConfig;
use plugload_contract::{
    ABI_VERSION, CONTRACT_MODULE_NAME, CONTRACT_VERSION, DECLARATION_SYMBOL, PluginDeclaration,
    PluginFactory, PluginRegistrar, panic_message,
};
use semver::Version;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::manifest::ScopeManifest;

/// Per-file load failures. Each one skips a single module or dependency.
#[derive(Error, Debug)]
pub enum ModuleLoadError {
    #[error("failed to open {}: {reason}", .path.display())]
    Open { path: PathBuf, reason: String },

    #[error("{} does not export a plugin declaration", .path.display())]
    MissingDeclaration { path: PathBuf },

    #[error("{}: declaration ABI version {found}, host expects {expected}", .path.display())]
    AbiMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("{}: built against contract {found}, host provides {expected}", .path.display())]
    ContractMismatch {
        path: PathBuf,
        found: String,
        expected: String,
    },

    #[error("{}: checksum does not match plugin.toml", .path.display())]
    ChecksumMismatch { path: PathBuf },

    #[error("{} is the shared capability contract and is never loaded into a scope", .path.display())]
    SharedContract { path: PathBuf },

    #[error("{} lies outside plugin directory {}", .path.display(), .scope.display())]
    OutsideScope { path: PathBuf, scope: PathBuf },

    #[error("module scope '{scope}' has been released")]
    Released { scope: String },

    #[error("registration in {} panicked: {message}", .path.display())]
    RegistrationPanicked { path: PathBuf, message: String },

    #[error("dependency '{name}' not found in scope '{scope}'")]
    DependencyNotFound { scope: String, name: String },
}

// ── Modules ────────────────────────────────────────────────────

/// A mapped plugin module and the declaration it exports.
pub struct Module {
    path: PathBuf,
    declaration: PluginDeclaration,
    // Dropped last: the declaration points into the library.
    library: Option<Library>,
}

impl Module {
    /// Module whose declaration is linked into the current process.
    pub fn linked(path: &Path, declaration: PluginDeclaration) -> Self {
        Self {
            path: path.to_path_buf(),
            declaration,
            library: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn declaration(&self) -> &PluginDeclaration {
        &self.declaration
    }

    /// Whether the module was mapped from disk rather than linked in.
    pub fn is_mapped(&self) -> bool {
        self.library.is_some()
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("path", &self.path)
            .field("contract_version", &self.declaration.contract_version)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

/// A native library a scope mapped on behalf of its plugins.
pub struct NativeDependency {
    path: PathBuf,
    _library: Option<Library>,
}

impl NativeDependency {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Opens module files. [`NativeLoader`] maps real libraries; [`StaticLoader`]
/// serves declarations linked into the process.
pub trait ModuleLoader: Send + Sync {
    /// Open a plugin module and read its declaration.
    fn open(&self, path: &Path) -> Result<Module, ModuleLoadError>;

    /// Map a native dependency by full path.
    fn open_native(&self, path: &Path) -> Result<NativeDependency, ModuleLoadError>;
}

/// Loads shared libraries with `libloading`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLoader;

impl NativeLoader {
    fn open_library(path: &Path) -> Result<Library, ModuleLoadError> {
        let opened = unsafe { Self::map(path) };
        opened.map_err(|e| ModuleLoadError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// # Safety
    /// Runs the library's initializers.
    #[cfg(unix)]
    unsafe fn map(path: &Path) -> Result<Library, libloading::Error> {
        use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};
        let library = unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_LOCAL) }?;
        Ok(Library::from(library))
    }

    /// # Safety
    /// Runs the library's initializers.
    #[cfg(windows)]
    unsafe fn map(path: &Path) -> Result<Library, libloading::Error> {
        use libloading::os::windows::{LOAD_WITH_ALTERED_SEARCH_PATH, Library as WindowsLibrary};
        // Imports of the module resolve from its own directory first.
        let library = unsafe { WindowsLibrary::load_with_flags(path, LOAD_WITH_ALTERED_SEARCH_PATH) }?;
        Ok(Library::from(library))
    }
}

impl ModuleLoader for NativeLoader {
    fn open(&self, path: &Path) -> Result<Module, ModuleLoadError> {
        let library = Self::open_library(path)?;

        let declaration = unsafe {
            let symbol = library
                .get::<*const PluginDeclaration>(DECLARATION_SYMBOL)
                .map_err(|_| ModuleLoadError::MissingDeclaration {
                    path: path.to_path_buf(),
                })?;
            let raw: *const PluginDeclaration = *symbol;
            if raw.is_null() {
                return Err(ModuleLoadError::MissingDeclaration {
                    path: path.to_path_buf(),
                });
            }
            // Only the leading field is stable across ABI versions.
            let abi_version = std::ptr::addr_of!((*raw).abi_version).read();
            check_abi(path, abi_version)?;
            *raw
        };

        check_contract(path, declaration.contract_version)?;
        debug!(path = ?path, contract = declaration.contract_version, "mapped plugin module");

        Ok(Module {
            path: path.to_path_buf(),
            declaration,
            library: Some(library),
        })
    }

    fn open_native(&self, path: &Path) -> Result<NativeDependency, ModuleLoadError> {
        let library = Self::open_library(path)?;
        Ok(NativeDependency {
            path: path.to_path_buf(),
            _library: Some(library),
        })
    }
}

/// Serves declarations linked into the process, keyed by module file name.
///
/// The file must still exist on disk: discovery, checksums and dependency
/// resolution work exactly as for mapped modules.
#[derive(Default, Clone)]
pub struct StaticLoader {
    modules: HashMap<String, PluginDeclaration>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `declaration` for every module file named `file_name`.
    pub fn with_module(mut self, file_name: &str, declaration: PluginDeclaration) -> Self {
        self.insert(file_name, declaration);
        self
    }

    pub fn insert(&mut self, file_name: &str, declaration: PluginDeclaration) {
        self.modules.insert(file_name.to_lowercase(), declaration);
    }
}

impl ModuleLoader for StaticLoader {
    fn open(&self, path: &Path) -> Result<Module, ModuleLoadError> {
        if !path.is_file() {
            return Err(ModuleLoadError::Open {
                path: path.to_path_buf(),
                reason: "no such file".into(),
            });
        }
        let declaration = file_name(path)
            .and_then(|name| self.modules.get(&name.to_lowercase()))
            .copied()
            .ok_or_else(|| ModuleLoadError::MissingDeclaration {
                path: path.to_path_buf(),
            })?;

        check_abi(path, declaration.abi_version)?;
        check_contract(path, declaration.contract_version)?;
        Ok(Module::linked(path, declaration))
    }

    fn open_native(&self, path: &Path) -> Result<NativeDependency, ModuleLoadError> {
        if !path.is_file() {
            return Err(ModuleLoadError::Open {
                path: path.to_path_buf(),
                reason: "no such file".into(),
            });
        }
        Ok(NativeDependency {
            path: path.to_path_buf(),
            _library: None,
        })
    }
}

fn check_abi(path: &Path, found: u32) -> Result<(), ModuleLoadError> {
    if found != ABI_VERSION {
        return Err(ModuleLoadError::AbiMismatch {
            path: path.to_path_buf(),
            found,
            expected: ABI_VERSION,
        });
    }
    Ok(())
}

/// The module must be built against exactly the host's contract version:
/// trait object vtables are shared across the boundary.
fn check_contract(path: &Path, found: &str) -> Result<(), ModuleLoadError> {
    let mismatch = || ModuleLoadError::ContractMismatch {
        path: path.to_path_buf(),
        found: found.to_string(),
        expected: CONTRACT_VERSION.to_string(),
    };
    let host = Version::parse(CONTRACT_VERSION).map_err(|_| mismatch())?;
    let module = Version::parse(found.trim()).map_err(|_| mismatch())?;
    if module == host {
        Ok(())
    } else {
        Err(mismatch())
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Whether `spec` names the shared capability contract library, in any of
/// its platform spellings (`plugload_contract`, `libplugload_contract.so`,
/// `plugload-contract.dll`, ...).
pub fn is_contract_module(spec: &str) -> bool {
    let name = Path::new(spec)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(spec);
    let stem = name.split('.').next().unwrap_or(name);
    let stem = stem.strip_prefix("lib").unwrap_or(stem);
    stem.replace('-', "_").eq_ignore_ascii_case(CONTRACT_MODULE_NAME)
}

// ── Scope ──────────────────────────────────────────────────────

/// One activatable type registered by a module.
pub struct PluginType {
    pub type_name: String,
    pub factory: PluginFactory,
}

impl std::fmt::Debug for PluginType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginType")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// The loading context of one plugin directory.
pub struct ModuleScope {
    name: String,
    directory: PathBuf,
    manifest: Option<ScopeManifest>,
    config: PluginsConfig,
    loader: Arc<dyn ModuleLoader>,
    modules: Vec<Arc<Module>>,
    natives: Vec<NativeDependency>,
    released: bool,
}

impl ModuleScope {
    /// Create the scope for `directory`, reading its `plugin.toml` if present.
    pub fn create(
        directory: &Path,
        loader: Arc<dyn ModuleLoader>,
        config: &PluginsConfig,
    ) -> plugload_core::Result<Self> {
        if !directory.is_dir() {
            return Err(plugload_core::PlugloadError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("plugin directory not found: {}", directory.display()),
            )));
        }
        let manifest = ScopeManifest::load(directory)?;
        let name = file_name(directory)
            .map(str::to_string)
            .unwrap_or_else(|| directory.display().to_string());

        debug!(scope = %name, has_manifest = manifest.is_some(), "created module scope");

        Ok(Self {
            name,
            directory: directory.to_path_buf(),
            manifest,
            config: config.clone(),
            loader,
            modules: Vec::new(),
            natives: Vec::new(),
            released: false,
        })
    }

    /// Directory name; also the scope's identity in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn manifest(&self) -> Option<&ScopeManifest> {
        self.manifest.as_ref()
    }

    /// Modules loaded so far, in load order.
    pub fn modules(&self) -> &[Arc<Module>] {
        &self.modules
    }

    /// Native dependencies mapped so far.
    pub fn natives(&self) -> &[NativeDependency] {
        &self.natives
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Module files directly inside the directory, sorted by file name.
    /// Subdirectories are not scanned; they can hold dependencies.
    pub fn module_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.directory)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.config.is_module_file(path))
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Resolve a dependency the way this scope's modules see it: the
    /// manifest's `[dependencies]` first, then the plugin directory, then the
    /// manifest's `search_paths`. The capability contract never resolves,
    /// and neither does anything outside the plugin directory.
    pub fn resolve_dependency(&self, spec: &str) -> Option<PathBuf> {
        if is_contract_module(spec) {
            debug!(scope = %self.name, dependency = spec, "contract resolves from the host");
            return None;
        }

        if let Some(mapped) = self
            .manifest
            .as_ref()
            .and_then(|m| m.dependencies.get(spec))
        {
            let path = self.directory.join(mapped);
            if !path.is_file() {
                debug!(scope = %self.name, dependency = spec, path = ?path, "mapped dependency missing on disk");
            } else if self.contains(&path) {
                return Some(path);
            } else {
                warn!(scope = %self.name, dependency = spec, path = ?path, "mapped dependency lies outside the plugin directory");
            }
        }

        let mut roots = vec![self.directory.clone()];
        if let Some(manifest) = &self.manifest {
            roots.extend(manifest.search_paths.iter().map(|p| self.directory.join(p)));
        }

        let candidates = self.candidates(spec);
        roots
            .iter()
            .flat_map(|root| candidates.iter().map(move |c| root.join(c)))
            .find(|path| path.is_file() && self.contains(path))
    }

    /// Whether `path` resolves to a file inside the plugin directory.
    fn contains(&self, path: &Path) -> bool {
        match (std::fs::canonicalize(path), std::fs::canonicalize(&self.directory)) {
            (Ok(path), Ok(directory)) => path.starts_with(directory),
            _ => false,
        }
    }

    fn candidates(&self, spec: &str) -> Vec<String> {
        let mut names = vec![spec.to_string()];
        for ext in &self.config.module_extensions {
            let ext = ext.trim_start_matches('.');
            names.push(format!("{spec}.{ext}"));
            if !spec.starts_with("lib") {
                names.push(format!("lib{spec}.{ext}"));
            }
        }
        names
    }

    /// Map a native dependency through this scope. Mapping the same file
    /// twice is a no-op.
    pub fn load_native_dependency(&mut self, spec: &str) -> Result<PathBuf, ModuleLoadError> {
        self.ensure_live()?;
        let path = self
            .resolve_dependency(spec)
            .ok_or_else(|| ModuleLoadError::DependencyNotFound {
                scope: self.name.clone(),
                name: spec.to_string(),
            })?;

        if self.natives.iter().any(|n| n.path == path) {
            return Ok(path);
        }
        let native = self.loader.open_native(&path)?;
        info!(scope = %self.name, dependency = spec, path = ?path, "mapped native dependency");
        self.natives.push(native);
        Ok(path)
    }

    /// Map every dependency listed in the manifest's `preload`. Returns the
    /// failures; the rest stay mapped.
    pub fn preload(&mut self) -> Vec<ModuleLoadError> {
        let specs = self
            .manifest
            .as_ref()
            .map(|m| m.preload.clone())
            .unwrap_or_default();
        specs
            .iter()
            .filter_map(|spec| self.load_native_dependency(spec).err())
            .collect()
    }

    /// Load one plugin module from this directory.
    pub fn load_module(&mut self, path: &Path) -> Result<Arc<Module>, ModuleLoadError> {
        self.ensure_live()?;

        if file_name(path).is_some_and(is_contract_module) {
            return Err(ModuleLoadError::SharedContract {
                path: path.to_path_buf(),
            });
        }

        let open_err = |e: std::io::Error| ModuleLoadError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let canonical = std::fs::canonicalize(path).map_err(open_err)?;
        let directory = std::fs::canonicalize(&self.directory).map_err(open_err)?;
        if canonical.parent() != Some(directory.as_path()) {
            return Err(ModuleLoadError::OutsideScope {
                path: path.to_path_buf(),
                scope: self.directory.clone(),
            });
        }

        let existing = self
            .modules
            .iter()
            .find(|m| std::fs::canonicalize(&m.path).is_ok_and(|p| p == canonical));
        if let Some(existing) = existing {
            return Ok(Arc::clone(existing));
        }

        if let (Some(manifest), Some(name)) = (&self.manifest, file_name(path)) {
            if manifest.checksum_for(name).is_some() {
                let bytes = std::fs::read(path).map_err(open_err)?;
                if !manifest.verify_checksum(name, &bytes) {
                    return Err(ModuleLoadError::ChecksumMismatch {
                        path: path.to_path_buf(),
                    });
                }
            }
        }

        let module = Arc::new(self.loader.open(path)?);
        info!(scope = %self.name, path = ?path, "loaded plugin module");
        self.modules.push(Arc::clone(&module));
        Ok(module)
    }

    /// Run a module's registration callback and collect the types it
    /// registers, in registration order.
    pub fn register_plugins(&self, module: &Module) -> Result<Vec<PluginType>, ModuleLoadError> {
        self.ensure_live()?;
        let mut registrar = ScopeRegistrar {
            scope: self,
            types: Vec::new(),
            failure: None,
        };
        let register = module.declaration().register;

        // Modules exported with `export_plugin!` report their own panics
        // through the registrar; linked declarations may still unwind here.
        let outcome = catch_unwind(AssertUnwindSafe(|| register(&mut registrar)))
            .map_err(|payload| panic_message(payload.as_ref()));
        if let Some(message) = outcome.err().or(registrar.failure) {
            return Err(ModuleLoadError::RegistrationPanicked {
                path: module.path().to_path_buf(),
                message,
            });
        }

        Ok(registrar.types)
    }

    /// Drop every handle the scope owns. Modules stay mapped while plugin
    /// records created from them are alive.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        let modules = self.modules.len();
        self.modules.clear();
        self.natives.clear();
        self.released = true;
        debug!(scope = %self.name, modules, "released module scope");
    }

    fn ensure_live(&self) -> Result<(), ModuleLoadError> {
        if self.released {
            return Err(ModuleLoadError::Released {
                scope: self.name.clone(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for ModuleScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleScope")
            .field("name", &self.name)
            .field("directory", &self.directory)
            .field("modules", &self.modules)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

struct ScopeRegistrar<'a> {
    scope: &'a ModuleScope,
    types: Vec<PluginType>,
    failure: Option<String>,
}

impl PluginRegistrar for ScopeRegistrar<'_> {
    fn register_plugin(&mut self, type_name: &str, factory: PluginFactory) {
        debug!(scope = %self.scope.name, type_name, "registered plugin type");
        self.types.push(PluginType {
            type_name: type_name.to_string(),
            factory,
        });
    }

    fn resolve_dependency(&self, name: &str) -> Option<PathBuf> {
        self.scope.resolve_dependency(name)
    }

    fn registration_failed(&mut self, message: &str) {
        self.failure = Some(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugload_contract::{Plugin, PluginContext, PluginError};

    struct Nothing;

    impl Plugin for Nothing {
        fn name(&self) -> &str {
            "nothing"
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

    fn nothing() -> Result<Box<dyn Plugin>, PluginError> {
        Ok(Box::new(Nothing))
    }

    fn register_two(registrar: &mut dyn PluginRegistrar) {
        registrar.register_plugin("First", Box::new(nothing));
        registrar.register_plugin("Second", Box::new(nothing));
    }

    fn register_panics(_registrar: &mut dyn PluginRegistrar) {
        panic!("registration exploded");
    }

    mod half_way {
        use super::*;

        fn register(registrar: &mut dyn PluginRegistrar) {
            register_two(registrar);
            panic!("gave up after two");
        }

        plugload_contract::export_plugin!(register);
    }

    fn config() -> PluginsConfig {
        PluginsConfig {
            module_extensions: vec!["plug".into()],
            ..Default::default()
        }
    }

    fn scope_with(dir: &Path, loader: StaticLoader) -> ModuleScope {
        ModuleScope::create(dir, Arc::new(loader), &config()).unwrap()
    }

    #[test]
    fn contract_module_spellings() {
        assert!(is_contract_module("plugload_contract"));
        assert!(is_contract_module("plugload-contract"));
        assert!(is_contract_module("libplugload_contract.so"));
        assert!(is_contract_module("Plugload_Contract.dll"));
        assert!(is_contract_module("/opt/x/libplugload_contract.dylib"));
        assert!(!is_contract_module("greeter"));
        assert!(!is_contract_module("plugload_contract_ext"));
    }

    #[test]
    fn contract_versions() {
        let path = Path::new("m.plug");
        assert!(check_contract(path, CONTRACT_VERSION).is_ok());
        assert!(matches!(
            check_contract(path, "99.0.0"),
            Err(ModuleLoadError::ContractMismatch { .. })
        ));
        assert!(check_contract(path, "not a version").is_err());

        let host = Version::parse(CONTRACT_VERSION).unwrap();
        let next_patch = Version::new(host.major, host.minor, host.patch + 1);
        let next_minor = Version::new(host.major, host.minor + 1, 0);
        let previous = Version::new(host.major, host.minor, 0);
        for other in [next_patch, next_minor] {
            assert!(matches!(
                check_contract(path, &other.to_string()),
                Err(ModuleLoadError::ContractMismatch { .. })
            ));
        }
        if previous != host {
            assert!(check_contract(path, &previous.to_string()).is_err());
        }
        assert!(check_abi(path, ABI_VERSION).is_ok());
        assert!(matches!(
            check_abi(path, ABI_VERSION + 1),
            Err(ModuleLoadError::AbiMismatch { .. })
        ));
    }

    #[test]
    fn module_files_are_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.plug", "a.plug", "notes.txt", "plugin.toml"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("deps.plug")).unwrap();

        let scope = scope_with(dir.path(), StaticLoader::new());
        let files: Vec<_> = scope
            .module_files()
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec!["a.plug", "b.plug"]);
    }

    #[test]
    fn resolution_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("deps")).unwrap();
        std::fs::create_dir_all(dir.path().join("pinned")).unwrap();
        std::fs::write(dir.path().join("deps/libzlib.plug"), b"").unwrap();
        std::fs::write(dir.path().join("pinned/json.plug"), b"").unwrap();
        std::fs::write(dir.path().join("json.plug"), b"").unwrap();
        std::fs::write(dir.path().join("plugload_contract.plug"), b"").unwrap();
        std::fs::write(
            dir.path().join("plugin.toml"),
            "search_paths = [\"deps\"]\n\n[dependencies]\njson = \"pinned/json.plug\"\nghost = \"gone.plug\"\n",
        )
        .unwrap();

        let scope = scope_with(dir.path(), StaticLoader::new());
        assert_eq!(
            scope.resolve_dependency("json"),
            Some(dir.path().join("pinned/json.plug"))
        );
        assert_eq!(
            scope.resolve_dependency("zlib"),
            Some(dir.path().join("deps/libzlib.plug"))
        );
        assert_eq!(scope.resolve_dependency("ghost"), None);
        assert_eq!(scope.resolve_dependency("plugload_contract"), None);
    }

    #[test]
    fn resolution_stays_inside_the_directory() {
        let root = tempfile::tempdir().unwrap();
        let mine = root.path().join("Mine");
        let other = root.path().join("Other");
        std::fs::create_dir_all(mine.join("deps")).unwrap();
        std::fs::create_dir_all(&other).unwrap();
        std::fs::write(other.join("libgreeter.plug"), b"").unwrap();
        std::fs::write(other.join("zlib.plug"), b"").unwrap();
        std::fs::write(mine.join("deps/libzlib.plug"), b"").unwrap();
        std::fs::write(
            mine.join("plugin.toml"),
            "search_paths = [\"deps\", \"../Other\"]\n\n[dependencies]\ngreeter = \"../Other/libgreeter.plug\"\n",
        )
        .unwrap();

        let scope = scope_with(&mine, StaticLoader::new());
        assert_eq!(scope.resolve_dependency("greeter"), None);
        assert_eq!(scope.resolve_dependency("../Other/greeter"), None);
        assert_eq!(scope.resolve_dependency("../Other/zlib"), None);
        // The in-directory match wins; the sibling's copy is never a candidate.
        assert_eq!(
            scope.resolve_dependency("zlib"),
            Some(mine.join("deps/libzlib.plug"))
        );
    }

    #[test]
    fn load_module_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libplugload_contract.plug"), b"").unwrap();
        std::fs::write(dir.path().join("unknown.plug"), b"").unwrap();
        std::fs::write(other.path().join("two.plug"), b"").unwrap();

        let loader = StaticLoader::new().with_module("two.plug", PluginDeclaration::new(register_two));
        let mut scope = scope_with(dir.path(), loader);

        assert!(matches!(
            scope.load_module(&dir.path().join("libplugload_contract.plug")),
            Err(ModuleLoadError::SharedContract { .. })
        ));
        assert!(matches!(
            scope.load_module(&dir.path().join("unknown.plug")),
            Err(ModuleLoadError::MissingDeclaration { .. })
        ));
        assert!(matches!(
            scope.load_module(&other.path().join("two.plug")),
            Err(ModuleLoadError::OutsideScope { .. })
        ));
        assert!(matches!(
            scope.load_module(&dir.path().join("missing.plug")),
            Err(ModuleLoadError::Open { .. })
        ));
    }

    #[test]
    fn same_file_through_another_spelling_is_mapped_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("two.plug"), b"").unwrap();

        let loader = StaticLoader::new().with_module("two.plug", PluginDeclaration::new(register_two));
        let mut scope = scope_with(dir.path(), loader);

        let first = scope.load_module(&dir.path().join("two.plug")).unwrap();
        let dotted = scope.load_module(&dir.path().join(".").join("two.plug")).unwrap();
        let detour = scope
            .load_module(&dir.path().join("sub").join("..").join("two.plug"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &dotted));
        assert!(Arc::ptr_eq(&first, &detour));
        assert_eq!(scope.modules().len(), 1);
    }

    #[test]
    fn native_loader_refuses_non_libraries() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("libfake.plug");
        std::fs::write(&fake, b"this is not a shared library").unwrap();

        assert!(matches!(NativeLoader.open(&fake), Err(ModuleLoadError::Open { .. })));
        assert!(matches!(
            NativeLoader.open_native(&fake),
            Err(ModuleLoadError::Open { .. })
        ));
        assert!(matches!(
            NativeLoader.open(&dir.path().join("missing.plug")),
            Err(ModuleLoadError::Open { .. })
        ));
    }

    /// Path of the C library this process is linked against.
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    fn system_libc() -> PathBuf {
        let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
        let found = unsafe { libc::dladdr(libc::getpid as *const libc::c_void, &mut info) };
        assert_ne!(found, 0);
        let name = unsafe { std::ffi::CStr::from_ptr(info.dli_fname) };
        PathBuf::from(name.to_str().unwrap())
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn native_loader_maps_real_libraries() {
        let libc_path = system_libc();

        // A real library without the declaration is not a plugin module...
        match NativeLoader.open(&libc_path) {
            Err(ModuleLoadError::MissingDeclaration { path }) => assert_eq!(path, libc_path),
            other => panic!("unexpected: {:?}", other.map(|m| m.path().to_path_buf())),
        }

        // ...but maps fine as a native dependency.
        let native = NativeLoader.open_native(&libc_path).unwrap();
        assert_eq!(native.path(), libc_path);
    }

    #[test]
    fn checksum_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("two.plug"), b"real bytes").unwrap();
        let wrong = blake3::hash(b"other bytes").to_hex().to_string();
        std::fs::write(
            dir.path().join("plugin.toml"),
            format!("[checksums]\n\"two.plug\" = \"{wrong}\"\n"),
        )
        .unwrap();

        let loader = StaticLoader::new().with_module("two.plug", PluginDeclaration::new(register_two));
        let mut scope = scope_with(dir.path(), loader);
        assert!(matches!(
            scope.load_module(&dir.path().join("two.plug")),
            Err(ModuleLoadError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn register_and_release() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("two.plug"), b"").unwrap();
        std::fs::write(dir.path().join("boom.plug"), b"").unwrap();

        let loader = StaticLoader::new()
            .with_module("two.plug", PluginDeclaration::new(register_two))
            .with_module("boom.plug", PluginDeclaration::new(register_panics));
        let mut scope = scope_with(dir.path(), loader);

        let module = scope.load_module(&dir.path().join("two.plug")).unwrap();
        assert!(!module.is_mapped());
        let again = scope.load_module(&dir.path().join("two.plug")).unwrap();
        assert!(Arc::ptr_eq(&module, &again));
        drop(again);

        let types = scope.register_plugins(&module).unwrap();
        let names: Vec<_> = types.iter().map(|t| t.type_name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);

        let boom = scope.load_module(&dir.path().join("boom.plug")).unwrap();
        match scope.register_plugins(&boom) {
            Err(ModuleLoadError::RegistrationPanicked { message, .. }) => {
                assert!(message.contains("registration exploded"))
            }
            other => panic!("unexpected: {other:?}"),
        }

        scope.release();
        assert!(scope.is_released());
        assert!(scope.modules().is_empty());
        // The caller's handle keeps the module alive.
        assert_eq!(Arc::strong_count(&module), 1);
        assert!(matches!(
            scope.load_module(&dir.path().join("two.plug")),
            Err(ModuleLoadError::Released { .. })
        ));
    }

    #[test]
    fn exported_registration_panic_discards_types() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("half.plug"), b"").unwrap();

        let loader = StaticLoader::new().with_module("half.plug", half_way::PLUGLOAD_PLUGIN_DECLARATION);
        let mut scope = scope_with(dir.path(), loader);
        let module = scope.load_module(&dir.path().join("half.plug")).unwrap();

        match scope.register_plugins(&module) {
            Err(ModuleLoadError::RegistrationPanicked { message, path }) => {
                assert_eq!(message, "gave up after two");
                assert!(path.ends_with("half.plug"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn preload_maps_by_full_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("deps")).unwrap();
        std::fs::write(dir.path().join("deps/libgreeter.plug"), b"").unwrap();
        std::fs::write(
            dir.path().join("plugin.toml"),
            "search_paths = [\"deps\"]\npreload = [\"greeter\", \"absent\"]\n",
        )
        .unwrap();

        let mut scope = scope_with(dir.path(), StaticLoader::new());
        let failures = scope.preload();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], ModuleLoadError::DependencyNotFound { .. }));
        assert_eq!(scope.natives().len(), 1);
        assert_eq!(
            scope.natives()[0].path(),
            dir.path().join("deps/libgreeter.plug")
        );
    }
}
