//! Child compilers: isolated sub-builds under the parent's resolution rules.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use super::Compiler;
use crate::compilation::{AssetCache, Chunk, Compilation, ModuleCache, Templates};
use crate::config::{CompilerOptions, OutputOverrides};
use crate::error::{BuildError, Result};
use crate::factory::Resolvers;
use crate::fs::{InputFileSystem, Timestamps};
use crate::hooks::CompilerHooks;
use crate::parser::Parser;
use crate::records::SharedRecords;

/// Result of [`Compiler::run_as_child`].
#[derive(Debug, Clone)]
pub struct ChildOutput {
    /// Entry chunks of the child build.
    pub entries: Vec<Chunk>,
    pub compilation: Arc<Compilation>,
}

/// What a compiler hands down to its children.
///
/// Captured per compilation so plugins holding only a [`Compilation`] can
/// still spawn a child compiler.
#[derive(Clone)]
pub struct ChildSeed {
    hooks: CompilerHooks,
    options: Arc<CompilerOptions>,
    /// The parent's output path at the time of capture.
    output_path: PathBuf,
    input_file_system: Arc<dyn InputFileSystem>,
    resolvers: Resolvers,
    parser: Arc<Parser>,
    templates: Arc<Templates>,
    timestamps: Arc<RwLock<Arc<Timestamps>>>,
    module_cache: Arc<ModuleCache>,
}

impl ChildSeed {
    /// Build the child compiler attached to `parent`.
    pub(crate) fn spawn(
        &self,
        parent: Arc<Compilation>,
        name: &str,
        overrides: &OutputOverrides,
    ) -> Compiler {
        let options = self.options.with_output_overrides(overrides);
        crate::debug!("compile"; "child compiler {name}");

        Compiler {
            name: Some(name.to_owned()),
            output_path: self.output_path.clone(),
            options: Arc::new(options),
            input_file_system: Arc::clone(&self.input_file_system),
            output_file_system: None,
            watch_file_system: None,
            records_input_path: None,
            records_output_path: None,
            records: SharedRecords::default(),
            timestamps: Arc::clone(&self.timestamps),
            resolvers: self.resolvers.clone(),
            parser: Arc::clone(&self.parser),
            templates: Arc::clone(&self.templates),
            asset_cache: Arc::new(AssetCache::new()),
            module_cache: Arc::clone(&self.module_cache),
            hooks: self.hooks.for_child(),
            parent_compilation: Some(parent),
        }
    }
}

impl std::fmt::Debug for ChildSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildSeed").finish_non_exhaustive()
    }
}

impl Compiler {
    pub(super) fn seed(&self) -> ChildSeed {
        ChildSeed {
            hooks: self.hooks.clone(),
            options: Arc::clone(&self.options),
            output_path: self.output_path.clone(),
            input_file_system: Arc::clone(&self.input_file_system),
            resolvers: self.resolvers.clone(),
            parser: Arc::clone(&self.parser),
            templates: Arc::clone(&self.templates),
            timestamps: Arc::clone(&self.timestamps),
            module_cache: Arc::clone(&self.module_cache),
        }
    }

    /// A compiler for an isolated sub-build of `compilation`.
    ///
    /// The child shares templates, resolvers, the parser, the input file
    /// system and the timestamps. It writes under this compiler's current
    /// output path, whatever `overrides.path` says. It starts with empty records and no output
    /// file system. Handlers of `make`, `compile`, `emit`, `after-emit`,
    /// `invalid` and `done` are not inherited.
    pub fn create_child_compiler(
        &self,
        compilation: &Arc<Compilation>,
        name: &str,
        overrides: &OutputOverrides,
    ) -> Compiler {
        self.seed().spawn(Arc::clone(compilation), name, overrides)
    }

    /// Compile as a child and splice the result into the parent compilation.
    ///
    /// The child compilation is appended to the parent's children and its
    /// assets overwrite same-named parent assets.
    pub async fn run_as_child(&self) -> Result<ChildOutput> {
        let parent = self
            .parent_compilation
            .as_ref()
            .ok_or(BuildError::NotAChild)?;

        let compilation = self.compile().await?;
        parent.add_child(Arc::clone(&compilation));
        parent.merge_assets(&compilation);

        Ok(ChildOutput {
            entries: compilation.entry_chunks(),
            compilation,
        })
    }
}
