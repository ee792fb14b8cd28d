use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ResolveOptions, clean};
use crate::error::{BuildError, Result};
use crate::fs::InputFileSystem;

/// What a resolver is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveTarget {
    /// A file, with extension and `index` fallback.
    File,
    /// A directory, as written.
    Directory,
}

/// Turns a request string into an absolute path.
///
/// Requests starting with `./` or `../` are relative to the issuing
/// directory, absolute requests are taken as written, and anything else is
/// searched in the configured module directories of every ancestor.
pub struct Resolver {
    fs: Arc<dyn InputFileSystem>,
    target: ResolveTarget,
    extensions: Vec<String>,
    modules: Vec<String>,
}

impl Resolver {
    pub fn new(fs: Arc<dyn InputFileSystem>, target: ResolveTarget, options: &ResolveOptions) -> Self {
        Self {
            fs,
            target,
            extensions: options.extensions.clone(),
            modules: options.modules.clone(),
        }
    }

    pub fn target(&self) -> ResolveTarget {
        self.target
    }

    pub async fn resolve(&self, context: &Path, request: &str) -> Result<PathBuf> {
        let not_found = || BuildError::Resolve {
            request: request.to_owned(),
            context: context.to_path_buf(),
        };

        if request.is_empty() {
            return Err(not_found());
        }

        for candidate in self.candidates(context, request) {
            if let Some(found) = self.probe(&candidate).await {
                return Ok(found);
            }
        }
        Err(not_found())
    }

    fn candidates(&self, context: &Path, request: &str) -> Vec<PathBuf> {
        let relative = request == "."
            || request == ".."
            || request.starts_with("./")
            || request.starts_with("../");

        if relative {
            vec![clean(&context.join(request))]
        } else if Path::new(request).is_absolute() {
            vec![clean(Path::new(request))]
        } else {
            context
                .ancestors()
                .flat_map(|dir| self.modules.iter().map(move |m| dir.join(m).join(request)))
                .collect()
        }
    }

    async fn probe(&self, candidate: &Path) -> Option<PathBuf> {
        match self.target {
            ResolveTarget::Directory => self.is_dir(candidate).await.then(|| candidate.to_path_buf()),
            ResolveTarget::File => {
                if let Some(file) = self.probe_file(candidate).await {
                    return Some(file);
                }
                if self.is_dir(candidate).await {
                    return self.probe_file(&candidate.join("index")).await;
                }
                None
            }
        }
    }

    async fn probe_file(&self, base: &Path) -> Option<PathBuf> {
        for ext in &self.extensions {
            let mut path = base.as_os_str().to_owned();
            path.push(ext);
            let path = PathBuf::from(path);
            if self.fs.stat(&path).await.is_ok_and(|s| s.is_file) {
                return Some(path);
            }
        }
        None
    }

    async fn is_dir(&self, path: &Path) -> bool {
        self.fs.stat(path).await.is_ok_and(|s| s.is_dir)
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("target", &self.target)
            .field("extensions", &self.extensions)
            .field("modules", &self.modules)
            .finish()
    }
}

/// The three resolvers a compiler owns.
#[derive(Debug, Clone)]
pub struct Resolvers {
    /// Module requests.
    pub normal: Arc<Resolver>,
    /// Loader requests; searched like modules.
    pub loader: Arc<Resolver>,
    /// `require.context` directories.
    pub context: Arc<Resolver>,
}

impl Resolvers {
    pub fn new(fs: Arc<dyn InputFileSystem>, options: &ResolveOptions) -> Self {
        Self {
            normal: Arc::new(Resolver::new(Arc::clone(&fs), ResolveTarget::File, options)),
            loader: Arc::new(Resolver::new(Arc::clone(&fs), ResolveTarget::File, options)),
            context: Arc::new(Resolver::new(fs, ResolveTarget::Directory, options)),
        }
    }

    /// Whether both sets are the very same resolver instances.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.normal, &other.normal)
            && Arc::ptr_eq(&self.loader, &other.loader)
            && Arc::ptr_eq(&self.context, &other.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    fn resolvers() -> Resolvers {
        let fs = MemoryFileSystem::new();
        fs.insert_file("/p/src/index.js", "");
        fs.insert_file("/p/src/util.js", "");
        fs.insert_file("/p/src/data.json", "{}");
        fs.insert_file("/p/src/lib/index.js", "");
        fs.insert_file("/p/node_modules/left-pad/index.js", "");
        fs.insert_file("/p/node_modules/left-pad/extra.js", "");
        Resolvers::new(Arc::new(fs), &ResolveOptions::default())
    }

    #[tokio::test]
    async fn test_relative_with_extension_fallback() {
        let r = resolvers();
        let ctx = Path::new("/p/src");
        assert_eq!(r.normal.resolve(ctx, "./util").await.unwrap(), PathBuf::from("/p/src/util.js"));
        assert_eq!(r.normal.resolve(ctx, "./util.js").await.unwrap(), PathBuf::from("/p/src/util.js"));
        assert_eq!(r.normal.resolve(ctx, "./data").await.unwrap(), PathBuf::from("/p/src/data.json"));
        assert_eq!(r.normal.resolve(ctx, "./lib").await.unwrap(), PathBuf::from("/p/src/lib/index.js"));
        assert_eq!(
            r.normal.resolve(Path::new("/p/src/lib"), "../util").await.unwrap(),
            PathBuf::from("/p/src/util.js")
        );
    }

    #[tokio::test]
    async fn test_module_directories_searched_upward() {
        let r = resolvers();
        let ctx = Path::new("/p/src/lib");
        assert_eq!(
            r.normal.resolve(ctx, "left-pad").await.unwrap(),
            PathBuf::from("/p/node_modules/left-pad/index.js")
        );
        assert_eq!(
            r.normal.resolve(ctx, "left-pad/extra").await.unwrap(),
            PathBuf::from("/p/node_modules/left-pad/extra.js")
        );
    }

    #[tokio::test]
    async fn test_missing_request() {
        let r = resolvers();
        let err = r.normal.resolve(Path::new("/p/src"), "./nope").await.unwrap_err();
        assert!(matches!(err, BuildError::Resolve { ref request, .. } if request == "./nope"));
        assert!(err.to_string().contains("/p/src"));
    }

    #[tokio::test]
    async fn test_context_resolver_wants_directories() {
        let r = resolvers();
        let ctx = Path::new("/p/src");
        assert_eq!(r.context.resolve(ctx, "./lib").await.unwrap(), PathBuf::from("/p/src/lib"));
        assert!(r.context.resolve(ctx, "./util.js").await.is_err());
    }
}
