use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Resolvers;
use crate::compilation::{Module, ModuleCache, ParsedModule};
use crate::error::{BuildError, Result};
use crate::fs::{InputFileSystem, Timestamps, now_millis};
use crate::hooks::Tap;
use crate::parser::{Parser, ParserState};

type RequestRewrite = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Creates modules from request strings: resolve, read, parse.
pub struct NormalModuleFactory {
    context: PathBuf,
    resolvers: Resolvers,
    parser: Arc<Parser>,
    fs: Arc<dyn InputFileSystem>,
    cache: Arc<ModuleCache>,
    timestamps: Arc<Timestamps>,
    rewrites: Vec<Tap<RequestRewrite>>,
}

impl NormalModuleFactory {
    pub fn new(
        context: PathBuf,
        resolvers: Resolvers,
        parser: Arc<Parser>,
        fs: Arc<dyn InputFileSystem>,
        cache: Arc<ModuleCache>,
        timestamps: Arc<Timestamps>,
    ) -> Self {
        Self {
            context,
            resolvers,
            parser,
            fs,
            cache,
            timestamps,
            rewrites: Vec::new(),
        }
    }

    /// Default context for entry requests.
    pub fn context(&self) -> &Path {
        &self.context
    }

    pub fn resolvers(&self) -> &Resolvers {
        &self.resolvers
    }

    /// Rewrite requests before resolution. The first rewrite returning
    /// `Some` wins.
    pub fn on_before_resolve<F>(&mut self, plugin: &str, rewrite: F)
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.rewrites.push(Tap::new(plugin, Arc::new(rewrite)));
    }

    pub async fn resolve(&self, context: &Path, request: &str) -> Result<PathBuf> {
        let rewritten = self
            .rewrites
            .iter()
            .find_map(|tap| (tap.handler())(request));
        let request = rewritten.as_deref().unwrap_or(request);
        self.resolvers.normal.resolve(context, request).await
    }

    /// Build the module for a resolved resource, reusing a fresh cached
    /// parse when the timestamps allow it.
    pub async fn build(&self, resource: &Path) -> Result<Module> {
        if let Some(parsed) = self.cache.fresh(resource, &self.timestamps) {
            crate::debug!("compile"; "cached {}", resource.display());
            return Ok(Module::new(parsed, false));
        }

        let build_timestamp = now_millis();
        let bytes = self
            .fs
            .read_file(resource)
            .await
            .map_err(|e| BuildError::io(resource, e))?;
        let text = String::from_utf8_lossy(&bytes);

        let parsed = if resource.extension().is_some_and(|ext| ext == "json") {
            ParsedModule {
                resource: resource.to_path_buf(),
                source: format!("module.exports = {};", text.trim()),
                dependencies: Vec::new(),
                variables: Vec::new(),
                build_timestamp,
            }
        } else {
            let mut state = ParserState::new(resource);
            self.parser.parse(&text, &mut state);
            let (dependencies, variables) = state.finish();
            ParsedModule {
                resource: resource.to_path_buf(),
                source: text.into_owned(),
                dependencies,
                variables,
                build_timestamp,
            }
        };

        let parsed = Arc::new(parsed);
        self.cache.store(Arc::clone(&parsed));
        Ok(Module::new(parsed, true))
    }

    /// Resolve and build in one step.
    pub async fn create(&self, context: &Path, request: &str) -> Result<Module> {
        let resource = self.resolve(context, request).await?;
        self.build(&resource).await
    }
}

impl std::fmt::Debug for NormalModuleFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalModuleFactory")
            .field("context", &self.context)
            .field("rewrites", &self.rewrites)
            .finish_non_exhaustive()
    }
}
