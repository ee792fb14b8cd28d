//! weft - the orchestration core of a module bundler.
//!
//! A [`Compiler`] drives every build through the same phases:
//!
//! ```text
//! run ─► read records ─► compile ─► make ─► seal ─► emit assets ─► emit records ─► done
//! ```
//!
//! Plugins extend the pipeline by tapping the typed hooks in
//! [`CompilerHooks`](hooks::CompilerHooks). [`Compiler::watch`] keeps a
//! compiler alive and rebuilds on file changes, one cycle at a time, while the
//! records document keeps module and chunk ids stable between builds.

pub mod logger;

pub mod cli;
pub mod compilation;
pub mod compiler;
pub mod config;
pub mod error;
pub mod factory;
pub mod fs;
pub mod hooks;
pub mod parser;
pub mod plugins;
pub mod records;
pub mod stats;
pub mod watch;

pub use compilation::Compilation;
pub use compiler::Compiler;
pub use config::CompilerOptions;
pub use error::{BuildError, Result};
pub use stats::Stats;
