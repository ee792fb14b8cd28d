use std::sync::Arc;

use super::{AsyncParallelHook, AsyncSeriesHook, HookName, SyncHook};
use crate::compilation::Compilation;
use crate::compiler::Compiler;
use crate::error::BuildError;
use crate::factory::{CompilationParams, ContextModuleFactory, NormalModuleFactory};
use crate::stats::Stats;
use crate::watch::Watching;

/// Every extension point fired by the compiler lifecycle.
#[derive(Clone, Debug)]
pub struct CompilerHooks {
    /// `watch-run(watching)`: start of every watch cycle.
    pub watch_run: AsyncSeriesHook<Watching>,
    /// `run(compiler)`: start of a one-shot build.
    pub run: AsyncSeriesHook<Compiler>,
    /// `compile(params)`: plugins may observe or replace the factories.
    pub compile: SyncHook<CompilationParams>,
    /// `compilation(compilation, params)`: params are reachable through
    /// [`Compilation::params`].
    pub compilation: SyncHook<Compilation>,
    /// `make(compilation)`: builders populate the graph concurrently.
    pub make: AsyncParallelHook<Arc<Compilation>>,
    pub after_compile: AsyncSeriesHook<Arc<Compilation>>,
    pub emit: AsyncSeriesHook<Arc<Compilation>>,
    pub after_emit: AsyncSeriesHook<Arc<Compilation>>,
    pub done: SyncHook<Stats>,
    pub failed: SyncHook<BuildError>,
    pub invalid: SyncHook<()>,
    pub normal_module_factory: SyncHook<NormalModuleFactory>,
    pub context_module_factory: SyncHook<ContextModuleFactory>,
}

impl CompilerHooks {
    pub fn new() -> Self {
        Self {
            watch_run: AsyncSeriesHook::new(HookName::WatchRun),
            run: AsyncSeriesHook::new(HookName::Run),
            compile: SyncHook::new(),
            compilation: SyncHook::new(),
            make: AsyncParallelHook::new(HookName::Make),
            after_compile: AsyncSeriesHook::new(HookName::AfterCompile),
            emit: AsyncSeriesHook::new(HookName::Emit),
            after_emit: AsyncSeriesHook::new(HookName::AfterEmit),
            done: SyncHook::new(),
            failed: SyncHook::new(),
            invalid: SyncHook::new(),
            normal_module_factory: SyncHook::new(),
            context_module_factory: SyncHook::new(),
        }
    }

    /// Copy of the registry for a child compiler.
    ///
    /// Handlers of inherited hooks are shared (same instances, same order);
    /// see [`HookName::inherited_by_child`] for the excluded ones.
    pub fn for_child(&self) -> Self {
        Self {
            watch_run: self.watch_run.clone(),
            run: self.run.clone(),
            compile: SyncHook::new(),
            compilation: self.compilation.clone(),
            make: self.make.cleared(),
            after_compile: self.after_compile.clone(),
            emit: self.emit.cleared(),
            after_emit: self.after_emit.cleared(),
            done: SyncHook::new(),
            failed: self.failed.clone(),
            invalid: SyncHook::new(),
            normal_module_factory: self.normal_module_factory.clone(),
            context_module_factory: self.context_module_factory.clone(),
        }
    }

    /// Plugin names registered under an extension point, in order.
    pub fn plugins(&self, name: HookName) -> Vec<&str> {
        macro_rules! names {
            ($hook:expr) => {
                $hook.taps().iter().map(|t| t.plugin()).collect()
            };
        }

        match name {
            HookName::WatchRun => names!(self.watch_run),
            HookName::Run => names!(self.run),
            HookName::Compile => names!(self.compile),
            HookName::Compilation => names!(self.compilation),
            HookName::Make => names!(self.make),
            HookName::AfterCompile => names!(self.after_compile),
            HookName::Emit => names!(self.emit),
            HookName::AfterEmit => names!(self.after_emit),
            HookName::Done => names!(self.done),
            HookName::Failed => names!(self.failed),
            HookName::Invalid => names!(self.invalid),
            HookName::NormalModuleFactory => names!(self.normal_module_factory),
            HookName::ContextModuleFactory => names!(self.context_module_factory),
        }
    }

    /// Number of handlers registered under an extension point.
    pub fn count(&self, name: HookName) -> usize {
        self.plugins(name).len()
    }
}

impl Default for CompilerHooks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tap_everything(hooks: &mut CompilerHooks) {
        hooks.watch_run.tap("P", |_| Box::pin(async { Ok(()) }));
        hooks.run.tap("P", |_| Box::pin(async { Ok(()) }));
        hooks.compile.tap("P", |_| {});
        hooks.compilation.tap("P", |_| {});
        hooks.make.tap("P", |_| Box::pin(async { Ok(()) }));
        hooks.after_compile.tap("P", |_| Box::pin(async { Ok(()) }));
        hooks.after_compile.tap("Q", |_| Box::pin(async { Ok(()) }));
        hooks.emit.tap("P", |_| Box::pin(async { Ok(()) }));
        hooks.after_emit.tap("P", |_| Box::pin(async { Ok(()) }));
        hooks.done.tap("P", |_| {});
        hooks.failed.tap("P", |_| {});
        hooks.invalid.tap("P", |_| {});
        hooks.normal_module_factory.tap("P", |_| {});
        hooks.context_module_factory.tap("P", |_| {});
    }

    #[test]
    fn test_for_child_drops_lifecycle_hooks() {
        let mut hooks = CompilerHooks::new();
        tap_everything(&mut hooks);

        let child = hooks.for_child();
        for name in HookName::ALL {
            if name.inherited_by_child() {
                assert_eq!(child.plugins(name), hooks.plugins(name), "{name}");
            } else {
                assert_eq!(child.count(name), 0, "{name}");
            }
        }
    }

    #[test]
    fn test_for_child_shares_handler_identity() {
        let mut hooks = CompilerHooks::new();
        tap_everything(&mut hooks);

        let child = hooks.for_child();
        let parent_taps = hooks.after_compile.taps();
        let child_taps = child.after_compile.taps();
        assert_eq!(child_taps.len(), 2);
        assert!(child_taps[0].same_handler(&parent_taps[0]));
        assert!(child_taps[1].same_handler(&parent_taps[1]));
        assert_eq!(child_taps[1].plugin(), "Q");
        assert_eq!(child.make.name(), HookName::Make);
    }
}
