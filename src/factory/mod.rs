//! Module factories and resolution.
//!
//! A fresh pair of factories is created for every compilation and handed to
//! the `compile` hook as [`CompilationParams`], where plugins may inspect or
//! replace them before the compilation exists.

mod context;
mod normal;
mod resolver;

use std::sync::Arc;

pub use context::{ContextModule, ContextModuleFactory};
pub use normal::NormalModuleFactory;
pub use resolver::{ResolveTarget, Resolver, Resolvers};

/// Factories used by one compilation.
#[derive(Debug, Clone)]
pub struct CompilationParams {
    pub normal_module_factory: Arc<NormalModuleFactory>,
    pub context_module_factory: Arc<ContextModuleFactory>,
}

#[cfg(test)]
mod tests;
