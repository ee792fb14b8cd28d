//! The long-lived build orchestrator.
//!
//! ```text
//! run ─► run hook ─► read_records ─► compile ─► emit_assets ─► emit_records ─► done
//!                                      │
//!                                      └─ compile hook ─► compilation hook ─► make ─► seal ─► after-compile
//! ```
//!
//! Every step is awaited in order and the first error short-circuits the rest.
//! A failed one-shot build fires `failed` instead of `done`.

mod child;
mod emit;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

pub use child::{ChildOutput, ChildSeed};

use crate::compilation::{AssetCache, Compilation, CompilationInit, ModuleCache, Templates};
use crate::config::{CompilerOptions, normalize_path_separators};
use crate::error::{BuildError, Result};
use crate::factory::{CompilationParams, ContextModuleFactory, NormalModuleFactory, Resolvers};
use crate::fs::{DiskFileSystem, InputFileSystem, OutputFileSystem, Timestamps, now_millis};
use crate::hooks::CompilerHooks;
use crate::parser::Parser;
use crate::plugins::{EntryPlugin, NodeStuffPlugin, Plugin};
use crate::records::{Records, SharedRecords};
use crate::stats::Stats;
use crate::watch::{NotifyWatchFileSystem, WatchFileSystem, Watching, WatchingHandle};

pub struct Compiler {
    name: Option<String>,
    options: Arc<CompilerOptions>,
    output_path: PathBuf,

    input_file_system: Arc<dyn InputFileSystem>,
    output_file_system: Option<Arc<dyn OutputFileSystem>>,
    watch_file_system: Option<Arc<dyn WatchFileSystem>>,

    records_input_path: Option<PathBuf>,
    records_output_path: Option<PathBuf>,
    records: SharedRecords,
    /// Replaced wholesale between watch cycles; shared with children.
    timestamps: Arc<RwLock<Arc<Timestamps>>>,

    resolvers: Resolvers,
    parser: Arc<Parser>,
    templates: Arc<Templates>,
    asset_cache: Arc<AssetCache>,
    module_cache: Arc<ModuleCache>,

    pub hooks: CompilerHooks,
    parent_compilation: Option<Arc<Compilation>>,
}

impl Compiler {
    /// A compiler reading and writing the local disk, with no plugins.
    pub fn new(options: CompilerOptions) -> Self {
        let input: Arc<dyn InputFileSystem> = Arc::new(DiskFileSystem);
        let output: Arc<dyn OutputFileSystem> = Arc::new(DiskFileSystem);
        let resolvers = Resolvers::new(Arc::clone(&input), &options.resolve);

        let mut compiler = Self {
            name: None,
            output_path: options.output.path.clone(),
            input_file_system: input,
            output_file_system: Some(output),
            watch_file_system: Some(Arc::new(NotifyWatchFileSystem::new())),
            records_input_path: None,
            records_output_path: None,
            records: SharedRecords::default(),
            timestamps: Arc::default(),
            resolvers,
            parser: Arc::new(Parser::new()),
            templates: Arc::new(Templates::default()),
            asset_cache: Arc::new(AssetCache::new()),
            module_cache: Arc::new(ModuleCache::new()),
            hooks: CompilerHooks::new(),
            parent_compilation: None,
            options: Arc::new(options),
        };
        compiler.set_records_input_path(compiler.options.records_input().map(Path::to_path_buf));
        compiler.set_records_output_path(compiler.options.records_output().map(Path::to_path_buf));
        compiler
    }

    /// [`Compiler::new`] with one [`EntryPlugin`] per configured entry and the
    /// [`NodeStuffPlugin`] applied.
    pub fn from_options(options: CompilerOptions) -> Self {
        let mut compiler = Self::new(options);
        let options = Arc::clone(&compiler.options);

        for (name, request) in &options.entry {
            compiler.apply(&EntryPlugin::new(&options.context, request, name));
        }
        compiler.apply(&NodeStuffPlugin::new(&options.context, &options.node));
        compiler
    }

    pub fn apply(&mut self, plugin: &dyn Plugin) {
        crate::debug!("compile"; "apply {}", plugin.name());
        plugin.apply(self);
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn options(&self) -> &Arc<CompilerOptions> {
        &self.options
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn set_output_path(&mut self, path: impl AsRef<Path>) {
        self.output_path = normalize_path_separators(path.as_ref());
    }

    pub fn input_file_system(&self) -> &Arc<dyn InputFileSystem> {
        &self.input_file_system
    }

    /// Swap the input side; resolvers are rebuilt on top of it.
    pub fn set_input_file_system(&mut self, fs: Arc<dyn InputFileSystem>) {
        self.resolvers = Resolvers::new(Arc::clone(&fs), &self.options.resolve);
        self.input_file_system = fs;
    }

    pub fn output_file_system(&self) -> Option<&Arc<dyn OutputFileSystem>> {
        self.output_file_system.as_ref()
    }

    pub fn set_output_file_system(&mut self, fs: Option<Arc<dyn OutputFileSystem>>) {
        self.output_file_system = fs;
    }

    pub fn watch_file_system(&self) -> Option<&Arc<dyn WatchFileSystem>> {
        self.watch_file_system.as_ref()
    }

    pub fn set_watch_file_system(&mut self, fs: Option<Arc<dyn WatchFileSystem>>) {
        self.watch_file_system = fs;
    }

    pub fn records_input_path(&self) -> Option<&Path> {
        self.records_input_path.as_deref()
    }

    pub fn records_output_path(&self) -> Option<&Path> {
        self.records_output_path.as_deref()
    }

    pub fn set_records_input_path(&mut self, path: Option<PathBuf>) {
        self.records_input_path = path.map(|p| normalize_path_separators(&p));
    }

    pub fn set_records_output_path(&mut self, path: Option<PathBuf>) {
        self.records_output_path = path.map(|p| normalize_path_separators(&p));
    }

    /// Shared handle to the records document.
    pub fn records(&self) -> &SharedRecords {
        &self.records
    }

    pub fn timestamps(&self) -> Arc<Timestamps> {
        Arc::clone(&self.timestamps.read())
    }

    /// Replace the modification times used for cache freshness.
    pub fn set_timestamps(&self, timestamps: Timestamps) {
        *self.timestamps.write() = Arc::new(timestamps);
    }

    pub fn resolvers(&self) -> &Resolvers {
        &self.resolvers
    }

    pub fn parser(&self) -> &Arc<Parser> {
        &self.parser
    }

    pub fn templates(&self) -> &Arc<Templates> {
        &self.templates
    }

    pub fn parent_compilation(&self) -> Option<&Arc<Compilation>> {
        self.parent_compilation.as_ref()
    }

    pub fn is_child(&self) -> bool {
        self.parent_compilation.is_some()
    }

    // ------------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------------

    /// One full build. `done` receives the stats on success; on failure
    /// `failed` fires and the error is returned.
    pub async fn run(&self) -> Result<Stats> {
        let start_time = now_millis();
        match self.run_phases(start_time).await {
            Ok(mut stats) => {
                self.hooks.done.call(&mut stats);
                Ok(stats)
            }
            Err(mut err) => {
                self.hooks.failed.call(&mut err);
                Err(err)
            }
        }
    }

    async fn run_phases(&self, start_time: u64) -> Result<Stats> {
        self.hooks.run.call(self).await?;
        self.read_records().await?;

        let compilation = self.compile().await?;
        self.emit_assets(&compilation).await?;
        self.emit_records().await?;

        Ok(Stats::new(compilation, start_time, now_millis()))
    }

    /// Build and seal a fresh compilation.
    pub async fn compile(&self) -> Result<Arc<Compilation>> {
        let mut params = self.new_compilation_params();
        self.hooks.compile.call(&mut params);

        let mut compilation = self.new_compilation(params);
        self.hooks.compilation.call(&mut compilation);
        let compilation = Arc::new(compilation);

        crate::debug!("compile"; "make ({} builders)", self.hooks.make.len());
        self.hooks.make.call(&compilation).await?;
        compilation.seal().await?;
        self.hooks.after_compile.call(&compilation).await?;

        Ok(compilation)
    }

    fn new_compilation_params(&self) -> CompilationParams {
        let mut normal = NormalModuleFactory::new(
            self.options.context.clone(),
            self.resolvers.clone(),
            Arc::clone(&self.parser),
            Arc::clone(&self.input_file_system),
            Arc::clone(&self.module_cache),
            self.timestamps(),
        );
        self.hooks.normal_module_factory.call(&mut normal);

        let mut context = ContextModuleFactory::new(
            self.resolvers.clone(),
            Arc::clone(&self.input_file_system),
            &self.options.resolve.extensions,
        );
        self.hooks.context_module_factory.call(&mut context);

        CompilationParams {
            normal_module_factory: Arc::new(normal),
            context_module_factory: Arc::new(context),
        }
    }

    fn new_compilation(&self, params: CompilationParams) -> Compilation {
        Compilation::new(CompilationInit {
            name: self.name.clone(),
            options: Arc::clone(&self.options),
            params,
            records: Arc::clone(&self.records),
            timestamps: self.timestamps(),
            templates: Arc::clone(&self.templates),
            asset_cache: Arc::clone(&self.asset_cache),
            seed: self.seed(),
        })
    }

    /// Load the records document before a build.
    ///
    /// No configured path or a missing file both leave empty records. A file
    /// that fails to parse is an error and the current records are kept.
    pub async fn read_records(&self) -> Result<()> {
        let Some(path) = self.records_input_path.as_deref() else {
            *self.records.write() = Records::new();
            return Ok(());
        };

        match self.input_file_system.stat(path).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                crate::debug!("records"; "{} not found, starting empty", path.display());
                *self.records.write() = Records::new();
                return Ok(());
            }
            Err(e) => return Err(BuildError::io(path, e)),
        }

        let bytes = self
            .input_file_system
            .read_file(path)
            .await
            .map_err(|e| BuildError::io(path, e))?;
        let records = Records::from_slice(&bytes).map_err(BuildError::RecordsParse)?;
        *self.records.write() = records;
        Ok(())
    }

    /// Start a watch session, consuming the compiler until it is closed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch<H>(self, delay: Duration, handler: H) -> Result<WatchingHandle>
    where
        H: FnMut(Result<Stats>) + Send + 'static,
    {
        if self.watch_file_system.is_none() {
            return Err(BuildError::MissingWatchFileSystem);
        }
        Ok(Watching::spawn(self, delay, handler))
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("name", &self.name)
            .field("output_path", &self.output_path)
            .field("records_input_path", &self.records_input_path)
            .field("records_output_path", &self.records_output_path)
            .field("is_child", &self.is_child())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
