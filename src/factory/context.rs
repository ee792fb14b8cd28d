use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Resolvers;
use crate::config::relative_to;
use crate::error::{BuildError, Result};
use crate::fs::InputFileSystem;

/// A directory together with the requireable files below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextModule {
    pub directory: PathBuf,
    /// `./relative/path.js` → absolute path.
    pub files: BTreeMap<String, PathBuf>,
}

/// Resolves `require.context` directories and lists their files.
pub struct ContextModuleFactory {
    resolvers: Resolvers,
    fs: Arc<dyn InputFileSystem>,
    extensions: Vec<String>,
}

impl ContextModuleFactory {
    /// `extensions` filters listed files; empty entries are ignored.
    pub fn new(resolvers: Resolvers, fs: Arc<dyn InputFileSystem>, extensions: &[String]) -> Self {
        Self {
            resolvers,
            fs,
            extensions: extensions.iter().filter(|e| !e.is_empty()).cloned().collect(),
        }
    }

    pub fn resolvers(&self) -> &Resolvers {
        &self.resolvers
    }

    pub async fn create(&self, context: &Path, request: &str) -> Result<ContextModule> {
        let directory = self.resolvers.context.resolve(context, request).await?;

        let mut files = BTreeMap::new();
        let mut pending = vec![directory.clone()];
        while let Some(dir) = pending.pop() {
            let entries = self
                .fs
                .read_dir(&dir)
                .await
                .map_err(|e| BuildError::io(&dir, e))?;
            for entry in entries {
                let stat = self
                    .fs
                    .stat(&entry)
                    .await
                    .map_err(|e| BuildError::io(&entry, e))?;
                if stat.is_dir {
                    pending.push(entry);
                } else if self.accepts(&entry) {
                    files.insert(format!("./{}", relative_to(&directory, &entry)), entry);
                }
            }
        }

        Ok(ContextModule { directory, files })
    }

    fn accepts(&self, path: &Path) -> bool {
        let name = path.to_string_lossy();
        self.extensions.is_empty() || self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }
}

impl std::fmt::Debug for ContextModuleFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextModuleFactory")
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}
