//! Modules, diagnostics and the parsed-module cache.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::fs::Timestamps;
use crate::parser::{Dependency, Variable};

/// Result of reading and parsing one resource.
#[derive(Debug, Clone)]
pub struct ParsedModule {
    pub resource: PathBuf,
    pub source: String,
    pub dependencies: Vec<Dependency>,
    pub variables: Vec<Variable>,
    /// When the resource was read, in milliseconds since the epoch.
    pub build_timestamp: u64,
}

impl ParsedModule {
    pub fn context(&self) -> &Path {
        self.resource.parent().unwrap_or(Path::new("/"))
    }
}

/// Parsed modules of previous builds, by resource.
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: DashMap<PathBuf, Arc<ParsedModule>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached parse of `resource`, if the timestamps prove it is still fresh.
    ///
    /// A resource without a known timestamp is never fresh.
    pub fn fresh(&self, resource: &Path, timestamps: &Timestamps) -> Option<Arc<ParsedModule>> {
        let cached = self.modules.get(resource)?;
        let changed = timestamps.file(resource)?;
        (changed < cached.build_timestamp).then(|| Arc::clone(&cached))
    }

    pub fn store(&self, module: Arc<ParsedModule>) {
        self.modules.insert(module.resource.clone(), module);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// What a module request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// Identifier of the target module.
    Module(String),
    /// `./relative` key → module identifier, for `require.context`.
    Context(BTreeMap<String, String>),
}

/// A module in a compilation's graph.
#[derive(Debug, Clone)]
pub struct Module {
    identifier: String,
    parsed: Arc<ParsedModule>,
    built: bool,
    error: Option<String>,
    links: BTreeMap<String, Link>,
}

impl Module {
    /// A module backed by a parse; `built` is false when it came from cache.
    pub fn new(parsed: Arc<ParsedModule>, built: bool) -> Self {
        Self {
            identifier: parsed.resource.display().to_string(),
            parsed,
            built,
            error: None,
            links: BTreeMap::new(),
        }
    }

    /// A module whose build failed; it renders to a throwing stub.
    pub fn failed(resource: PathBuf, message: impl Into<String>) -> Self {
        let parsed = Arc::new(ParsedModule {
            resource,
            source: String::new(),
            dependencies: Vec::new(),
            variables: Vec::new(),
            build_timestamp: 0,
        });
        Self {
            error: Some(message.into()),
            ..Self::new(parsed, true)
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn resource(&self) -> &Path {
        &self.parsed.resource
    }

    pub fn context(&self) -> &Path {
        self.parsed.context()
    }

    pub fn source(&self) -> &str {
        &self.parsed.source
    }

    pub fn size(&self) -> usize {
        self.parsed.source.len()
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.parsed.dependencies
    }

    pub fn variables(&self) -> &[Variable] {
        &self.parsed.variables
    }

    pub fn built(&self) -> bool {
        self.built
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn link(&mut self, request: &str, link: Link) {
        self.links.insert(request.to_owned(), link);
    }

    pub fn resolved(&self, request: &str) -> Option<&Link> {
        self.links.get(request)
    }

    /// Identifiers of every module this one links to, in request order.
    pub fn linked_modules(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        for link in self.links.values() {
            match link {
                Link::Module(id) => ids.push(id.as_str()),
                Link::Context(map) => ids.extend(map.values().map(String::as_str)),
            }
        }
        ids
    }
}

// ============================================================================
// Diagnostic
// ============================================================================

/// A module build error or warning.
///
/// Diagnostics never abort the pipeline; they travel with the compilation and
/// are surfaced through stats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Identifier of the module the diagnostic belongs to, if any.
    pub module: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(module: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            module: module.map(str::to_owned),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(module) = &self.module {
            writeln!(f, "{module}")?;
        }
        f.write_str(&self.message)
    }
}
