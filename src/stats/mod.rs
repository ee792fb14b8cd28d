//! Build summaries.
//!
//! [`Stats`] wraps a finished compilation with its start and end times and
//! renders it either as a serializable [`StatsJson`] or as terminal text.

mod json;
mod render;

use std::sync::Arc;

pub use json::{AssetJson, ChunkJson, ModuleJson, StatsJson};

use crate::compilation::Compilation;

/// What a summary includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsOptions {
    /// ANSI colors in text output.
    pub colors: bool,
    pub assets: bool,
    pub chunks: bool,
    pub modules: bool,
    pub children: bool,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            colors: false,
            assets: true,
            chunks: true,
            modules: true,
            children: true,
        }
    }
}

/// A finished build.
#[derive(Debug, Clone)]
pub struct Stats {
    pub compilation: Arc<Compilation>,
    /// Milliseconds since the epoch.
    pub start_time: u64,
    pub end_time: u64,
}

impl Stats {
    pub fn new(compilation: Arc<Compilation>, start_time: u64, end_time: u64) -> Self {
        Self {
            compilation,
            start_time,
            end_time,
        }
    }

    pub fn hash(&self) -> &str {
        self.compilation.hash()
    }

    /// Duration of the build in milliseconds.
    pub fn time(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time)
    }

    /// Errors in this compilation or any child.
    pub fn has_errors(&self) -> bool {
        any_diagnostics(&self.compilation, |c| !c.errors().is_empty())
    }

    pub fn has_warnings(&self) -> bool {
        any_diagnostics(&self.compilation, |c| !c.warnings().is_empty())
    }

    pub fn to_json(&self, options: &StatsOptions) -> StatsJson {
        StatsJson::of(&self.compilation, Some(self.time()), options)
    }

    /// Human-readable rendering of [`Stats::to_json`].
    pub fn to_string(&self, options: &StatsOptions) -> String {
        render::render(&self.to_json(options), options)
    }
}

fn any_diagnostics(compilation: &Compilation, check: fn(&Compilation) -> bool) -> bool {
    check(compilation)
        || compilation
            .children()
            .iter()
            .any(|child| any_diagnostics(child, check))
}
