//! One build's worth of state.
//!
//! A [`Compilation`] is created by [`Compiler::compile`], handed to the
//! `compilation` hook while still exclusively owned, and then shared as an
//! `Arc` with the `make`, `after-compile` and `emit` handlers. The module graph
//! stays open until [`Compilation::seal`], after which only assets,
//! diagnostics and children may still change.
//!
//! [`Compiler::compile`]: crate::compiler::Compiler::compile

mod asset;
mod chunk;
mod module;
mod seal;
mod template;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;

pub use asset::{Asset, AssetCache, ContentHash, RawSource, Source};
pub use chunk::{Chunk, SealedGraph, SealedModule};
pub use module::{Diagnostic, Link, Module, ModuleCache, ParsedModule};
pub use template::{MainTemplate, ModuleTemplate, Templates, render_body};
pub(crate) use template::json_str;

use crate::compiler::{ChildSeed, Compiler};
use crate::config::{CompilerOptions, OutputOverrides};
use crate::error::{BuildError, Result};
use crate::factory::CompilationParams;
use crate::fs::Timestamps;
use crate::parser::Dependency;
use crate::records::SharedRecords;

/// Everything a compilation borrows from its compiler.
pub(crate) struct CompilationInit {
    pub name: Option<String>,
    pub options: Arc<CompilerOptions>,
    pub params: CompilationParams,
    pub records: SharedRecords,
    pub timestamps: Arc<Timestamps>,
    pub templates: Arc<Templates>,
    pub asset_cache: Arc<AssetCache>,
    pub seed: ChildSeed,
}

/// Module graph while it is still being built.
#[derive(Default)]
struct Graph {
    modules: BTreeMap<String, Module>,
    /// Identifiers already claimed by some walk.
    reserved: FxHashSet<String>,
    /// `(entry name, module identifier)`, in registration order.
    entries: Vec<(String, String)>,
}

pub struct Compilation {
    name: Option<String>,
    options: Arc<CompilerOptions>,
    params: CompilationParams,
    records: SharedRecords,
    timestamps: Arc<Timestamps>,
    templates: Arc<Templates>,
    asset_cache: Arc<AssetCache>,
    seed: ChildSeed,

    /// `None` once sealed.
    graph: Mutex<Option<Graph>>,
    sealed: OnceLock<SealedGraph>,

    assets: RwLock<BTreeMap<String, Arc<Asset>>>,
    errors: Mutex<Vec<Diagnostic>>,
    warnings: Mutex<Vec<Diagnostic>>,
    children: Mutex<Vec<Arc<Compilation>>>,
    file_dependencies: Mutex<BTreeSet<PathBuf>>,
    context_dependencies: Mutex<BTreeSet<PathBuf>>,
}

impl Compilation {
    pub(crate) fn new(init: CompilationInit) -> Self {
        Self {
            name: init.name,
            options: init.options,
            params: init.params,
            records: init.records,
            timestamps: init.timestamps,
            templates: init.templates,
            asset_cache: init.asset_cache,
            seed: init.seed,
            graph: Mutex::new(Some(Graph::default())),
            sealed: OnceLock::new(),
            assets: RwLock::new(BTreeMap::new()),
            errors: Mutex::new(Vec::new()),
            warnings: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
            file_dependencies: Mutex::new(BTreeSet::new()),
            context_dependencies: Mutex::new(BTreeSet::new()),
        }
    }

    /// Name of the compiler that produced this compilation, for children.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn params(&self) -> &CompilationParams {
        &self.params
    }

    pub fn records(&self) -> &SharedRecords {
        &self.records
    }

    /// Timestamps snapshot this compilation was started with.
    pub fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    // ------------------------------------------------------------------------
    // Make
    // ------------------------------------------------------------------------

    /// Add an entry point and build every module reachable from it.
    ///
    /// Unresolvable requests and unreadable modules become diagnostics; only
    /// adding to a sealed compilation is an error.
    pub async fn add_entry(&self, context: &Path, request: &str, name: &str) -> Result<()> {
        let factory = Arc::clone(&self.params.normal_module_factory);
        let contexts = Arc::clone(&self.params.context_module_factory);

        let entry = match factory.resolve(context, request).await {
            Ok(resource) => resource,
            Err(e) => {
                self.push_error(Diagnostic::new(None, format!("Entry module not found: {e}")));
                return self.with_graph(|_| ());
            }
        };

        let entry_id = entry.display().to_string();
        let claimed = self.with_graph(|graph| {
            graph.entries.push((name.to_owned(), entry_id.clone()));
            graph.reserved.insert(entry_id.clone())
        })?;

        let mut queue = VecDeque::new();
        if claimed {
            queue.push_back(entry);
        }

        while let Some(resource) = queue.pop_front() {
            self.file_dependencies.lock().insert(resource.clone());

            let mut module = match factory.build(&resource).await {
                Ok(module) => module,
                Err(e) => {
                    let failed = Module::failed(resource, e.to_string());
                    self.push_error(Diagnostic::new(
                        Some(failed.identifier()),
                        format!("Module build failed: {e}"),
                    ));
                    failed
                }
            };

            let requests: Vec<(String, bool)> = module
                .dependencies()
                .iter()
                .filter_map(|dep| match dep {
                    Dependency::Require { request, .. } => Some((request.clone(), false)),
                    Dependency::Context { request, .. } => Some((request.clone(), true)),
                    Dependency::Const { .. } => None,
                })
                .collect();

            for (request, is_context) in requests {
                if module.resolved(&request).is_some() {
                    continue;
                }

                if is_context {
                    match contexts.create(module.context(), &request).await {
                        Ok(found) => {
                            self.context_dependencies.lock().insert(found.directory);
                            let mut map = BTreeMap::new();
                            for (key, file) in found.files {
                                let id = file.display().to_string();
                                if self.reserve(&id)? {
                                    queue.push_back(file);
                                }
                                map.insert(key, id);
                            }
                            module.link(&request, Link::Context(map));
                        }
                        Err(e) => self.push_error(Diagnostic::new(
                            Some(module.identifier()),
                            format!("Module not found: {e}"),
                        )),
                    }
                } else {
                    match factory.resolve(module.context(), &request).await {
                        Ok(target) => {
                            let id = target.display().to_string();
                            if self.reserve(&id)? {
                                queue.push_back(target);
                            }
                            module.link(&request, Link::Module(id));
                        }
                        Err(e) => self.push_error(Diagnostic::new(
                            Some(module.identifier()),
                            format!("Module not found: {e}"),
                        )),
                    }
                }
            }

            self.with_graph(|graph| {
                graph.modules.insert(module.identifier().to_owned(), module);
            })?;
        }

        Ok(())
    }

    fn with_graph<R>(&self, f: impl FnOnce(&mut Graph) -> R) -> Result<R> {
        let mut graph = self.graph.lock();
        let graph = graph.as_mut().ok_or(BuildError::AlreadySealed)?;
        Ok(f(graph))
    }

    fn reserve(&self, identifier: &str) -> Result<bool> {
        self.with_graph(|graph| graph.reserved.insert(identifier.to_owned()))
    }

    // ------------------------------------------------------------------------
    // Seal
    // ------------------------------------------------------------------------

    /// Freeze the module graph: assign ids, form chunks, render assets.
    pub async fn seal(self: &Arc<Self>) -> Result<()> {
        let graph = self.graph.lock().take().ok_or(BuildError::AlreadySealed)?;
        let entries = graph.entries;
        let modules = graph.modules;

        let this = Arc::clone(self);
        let sealed = tokio::task::spawn_blocking(move || this.seal_graph(entries, modules))
            .await
            .map_err(|e| BuildError::Task(e.to_string()))?;

        crate::debug!("seal"; "{} modules, {} chunks", sealed.modules.len(), sealed.chunks.len());
        self.sealed.set(sealed).map_err(|_| BuildError::AlreadySealed)
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.get().is_some()
    }

    pub fn sealed(&self) -> Result<&SealedGraph> {
        self.sealed.get().ok_or(BuildError::NotSealed)
    }

    /// Hash of the sealed output, empty before sealing.
    pub fn hash(&self) -> &str {
        self.sealed.get().map_or("", |s| s.hash.as_str())
    }

    pub fn modules(&self) -> &[SealedModule] {
        self.sealed.get().map_or(&[], |s| s.modules.as_slice())
    }

    pub fn chunks(&self) -> &[Chunk] {
        self.sealed.get().map_or(&[], |s| s.chunks.as_slice())
    }

    /// Entry chunks, in entry-name order.
    pub fn entry_chunks(&self) -> Vec<Chunk> {
        self.chunks().iter().filter(|c| c.entry).cloned().collect()
    }

    // ------------------------------------------------------------------------
    // Assets
    // ------------------------------------------------------------------------

    /// Add or replace an output asset.
    ///
    /// Content identical to the previous build's asset of the same name
    /// reuses that asset, including where it was written.
    pub fn emit_asset(&self, name: &str, source: impl Source + 'static) -> Arc<Asset> {
        let (asset, _) = self.asset_cache.intern(name, source);
        self.assets
            .write()
            .insert(name.to_owned(), Arc::clone(&asset));
        asset
    }

    pub(crate) fn insert_asset(&self, name: String, asset: Arc<Asset>) {
        self.assets.write().insert(name, asset);
    }

    pub(crate) fn intern_asset(&self, name: &str, source: impl Source + 'static) -> (Arc<Asset>, bool) {
        self.asset_cache.intern(name, source)
    }

    pub fn asset(&self, name: &str) -> Option<Arc<Asset>> {
        self.assets.read().get(name).cloned()
    }

    /// Snapshot of the asset map, ordered by name.
    pub fn assets(&self) -> Vec<(String, Arc<Asset>)> {
        self.assets
            .read()
            .iter()
            .map(|(name, asset)| (name.clone(), Arc::clone(asset)))
            .collect()
    }

    /// Copy every asset of `other` into this compilation.
    pub fn merge_assets(&self, other: &Compilation) {
        let incoming = other.assets();
        let mut assets = self.assets.write();
        for (name, asset) in incoming {
            assets.insert(name, asset);
        }
    }

    // ------------------------------------------------------------------------
    // Diagnostics and dependencies
    // ------------------------------------------------------------------------

    pub fn push_error(&self, diagnostic: Diagnostic) {
        self.errors.lock().push(diagnostic);
    }

    pub fn push_warning(&self, diagnostic: Diagnostic) {
        self.warnings.lock().push(diagnostic);
    }

    pub fn errors(&self) -> Vec<Diagnostic> {
        self.errors.lock().clone()
    }

    pub fn warnings(&self) -> Vec<Diagnostic> {
        self.warnings.lock().clone()
    }

    pub fn file_dependencies(&self) -> Vec<PathBuf> {
        self.file_dependencies.lock().iter().cloned().collect()
    }

    pub fn context_dependencies(&self) -> Vec<PathBuf> {
        self.context_dependencies.lock().iter().cloned().collect()
    }

    // ------------------------------------------------------------------------
    // Children
    // ------------------------------------------------------------------------

    pub fn add_child(&self, child: Arc<Compilation>) {
        self.children.lock().push(child);
    }

    pub fn children(&self) -> Vec<Arc<Compilation>> {
        self.children.lock().clone()
    }

    /// Child compiler attached to this compilation.
    ///
    /// See [`Compiler::create_child_compiler`] for what the child inherits.
    pub fn create_child_compiler(
        self: &Arc<Self>,
        name: &str,
        overrides: &OutputOverrides,
    ) -> Compiler {
        self.seed.spawn(Arc::clone(self), name, overrides)
    }
}

impl std::fmt::Debug for Compilation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compilation")
            .field("name", &self.name)
            .field("sealed", &self.is_sealed())
            .field("assets", &self.assets.read().len())
            .finish_non_exhaustive()
    }
}
