//! Typed hook registry.
//!
//! Extension points are keyed by [`HookName`] and come in three invocation
//! modes:
//!
//! | mode                  | type                  | failure channel                |
//! |-----------------------|-----------------------|--------------------------------|
//! | fire-and-forget       | [`SyncHook`]          | none                           |
//! | sequential-fallible   | [`AsyncSeriesHook`]   | first error aborts the rest    |
//! | parallel-fallible     | [`AsyncParallelHook`] | first error wins, all complete |
//!
//! [`CompilerHooks`] groups every extension point the pipeline fires.

mod parallel;
mod registry;
mod series;
mod sync;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use parallel::AsyncParallelHook;
pub use registry::CompilerHooks;
pub use series::AsyncSeriesHook;
pub use sync::SyncHook;

/// Boxed future type for async hook handlers (required for dyn compatibility).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Handler signature shared by series and parallel hooks.
pub type AsyncHandler<T> =
    dyn for<'a> Fn(&'a T) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync;

// ============================================================================
// HookName
// ============================================================================

/// Named extension points of the compiler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookName {
    WatchRun,
    Run,
    Compile,
    Compilation,
    Make,
    AfterCompile,
    Emit,
    AfterEmit,
    Done,
    Failed,
    Invalid,
    NormalModuleFactory,
    ContextModuleFactory,
}

impl HookName {
    pub const ALL: [Self; 13] = [
        Self::WatchRun,
        Self::Run,
        Self::Compile,
        Self::Compilation,
        Self::Make,
        Self::AfterCompile,
        Self::Emit,
        Self::AfterEmit,
        Self::Done,
        Self::Failed,
        Self::Invalid,
        Self::NormalModuleFactory,
        Self::ContextModuleFactory,
    ];

    /// Kebab-case name of the extension point.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WatchRun => "watch-run",
            Self::Run => "run",
            Self::Compile => "compile",
            Self::Compilation => "compilation",
            Self::Make => "make",
            Self::AfterCompile => "after-compile",
            Self::Emit => "emit",
            Self::AfterEmit => "after-emit",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Invalid => "invalid",
            Self::NormalModuleFactory => "normal-module-factory",
            Self::ContextModuleFactory => "context-module-factory",
        }
    }

    /// Whether a child compiler receives this hook's handlers.
    ///
    /// Top-level lifecycle hooks stay with the parent: a child build must not
    /// re-run the parent's make/emit logic or its completion notifications.
    pub const fn inherited_by_child(self) -> bool {
        !matches!(
            self,
            Self::Make | Self::Compile | Self::Emit | Self::AfterEmit | Self::Invalid | Self::Done
        )
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|hook| hook.as_str() == name)
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tap
// ============================================================================

/// A registered handler together with the plugin name that registered it.
pub struct Tap<F: ?Sized> {
    plugin: Arc<str>,
    handler: Arc<F>,
}

impl<F: ?Sized> Tap<F> {
    pub(crate) fn new(plugin: &str, handler: Arc<F>) -> Self {
        Self {
            plugin: Arc::from(plugin),
            handler,
        }
    }

    /// Name of the plugin that registered the handler.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn handler(&self) -> &Arc<F> {
        &self.handler
    }

    /// Check whether both taps share the same handler instance.
    pub fn same_handler(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.handler, &other.handler)
    }
}

impl<F: ?Sized> Clone for Tap<F> {
    fn clone(&self) -> Self {
        Self {
            plugin: Arc::clone(&self.plugin),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<F: ?Sized> fmt::Debug for Tap<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tap").field("plugin", &self.plugin).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_name_roundtrip() {
        for hook in HookName::ALL {
            assert_eq!(HookName::parse(hook.as_str()), Some(hook));
        }
        assert_eq!(HookName::parse("seal"), None);
    }

    #[test]
    fn test_child_inheritance() {
        let excluded: Vec<_> = HookName::ALL
            .into_iter()
            .filter(|h| !h.inherited_by_child())
            .map(HookName::as_str)
            .collect();
        assert_eq!(
            excluded,
            ["compile", "make", "emit", "after-emit", "done", "invalid"]
        );
    }
}
