//! Build pipeline error types.
//!
//! Every pipeline phase returns [`BuildError`] on its single error channel.
//! Diagnostics collected *inside* a compilation (module build errors and
//! warnings) are not pipeline failures; see [`crate::compilation::Diagnostic`].

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::hooks::HookName;

/// Result alias used throughout the pipeline.
pub type Result<T, E = BuildError> = std::result::Result<T, E>;

// ============================================================================
// BuildError
// ============================================================================

/// Fatal errors that abort the current build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("IO error at `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse records: {0}")]
    RecordsParse(#[source] serde_json::Error),

    #[error("Cannot serialize records: {0}")]
    RecordsSerialize(#[source] serde_json::Error),

    #[error("plugin `{plugin}` failed in `{hook}`: {source:#}")]
    Hook {
        hook: HookName,
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Cannot resolve `{request}` in `{}`", .context.display())]
    Resolve { request: String, context: PathBuf },

    #[error("compilation is already sealed")]
    AlreadySealed,

    #[error("compilation is not sealed yet")]
    NotSealed,

    #[error("compiler has no parent compilation")]
    NotAChild,

    #[error("no output file system configured")]
    MissingOutputFileSystem,

    #[error("no watch file system configured")]
    MissingWatchFileSystem,

    #[error("watcher failed: {0}")]
    Watch(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl BuildError {
    /// Wrap an IO error with the path it occurred at.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Wrap a plugin failure reported through an extension point.
    pub fn hook(hook: HookName, plugin: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Hook {
            hook,
            plugin: plugin.into(),
            source,
        }
    }

    /// Check if this error was reported by a plugin handler.
    pub fn is_hook(&self) -> bool {
        matches!(self, Self::Hook { .. })
    }

    /// Hook the failure was reported through, if any.
    pub fn hook_name(&self) -> Option<HookName> {
        match self {
            Self::Hook { hook, .. } => Some(*hook),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_build_error_display() {
        let io_err = BuildError::io("/dist/main.js", Error::new(ErrorKind::NotFound, "gone"));
        let display = format!("{io_err}");
        assert!(display.contains("IO error"));
        assert!(display.contains("/dist/main.js"));

        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let display = format!("{}", BuildError::RecordsParse(parse));
        assert!(display.starts_with("Cannot parse records: "));
    }

    #[test]
    fn test_hook_error_keeps_hook_name() {
        let err = BuildError::hook(HookName::Make, "EntryPlugin", anyhow::anyhow!("boom"));
        assert!(err.is_hook());
        assert_eq!(err.hook_name(), Some(HookName::Make));
        let display = format!("{err}");
        assert!(display.contains("`make`"));
        assert!(display.contains("EntryPlugin"));
        assert!(display.contains("boom"));
    }
}
