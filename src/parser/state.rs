use std::ops::Range;
use std::path::{Path, PathBuf};

/// Something a module's source refers to or gets rewritten with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// `require("request")`; the range covers the whole call.
    Require { request: String, range: Range<usize> },
    /// `require.context("dir")`; the range covers the whole call.
    Context { request: String, range: Range<usize> },
    /// Replace `range` with `expression` when rendering.
    Const {
        expression: String,
        range: Range<usize>,
    },
}

impl Dependency {
    pub fn range(&self) -> &Range<usize> {
        match self {
            Self::Require { range, .. } | Self::Context { range, .. } | Self::Const { range, .. } => {
                range
            }
        }
    }

    /// Request string for module-creating dependencies.
    pub fn request(&self) -> Option<&str> {
        match self {
            Self::Require { request, .. } | Self::Context { request, .. } => Some(request),
            Self::Const { .. } => None,
        }
    }
}

/// A variable injected at the top of a module's function scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub expression: String,
}

/// Per-module parse state handed to expression handlers.
#[derive(Debug, Clone)]
pub struct ParserState {
    resource: PathBuf,
    context: PathBuf,
    dependencies: Vec<Dependency>,
    variables: Vec<Variable>,
}

impl ParserState {
    pub fn new(resource: impl Into<PathBuf>) -> Self {
        let resource = resource.into();
        let context = resource
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            resource,
            context,
            dependencies: Vec::new(),
            variables: Vec::new(),
        }
    }

    /// Absolute path of the module being parsed.
    pub fn resource(&self) -> &Path {
        &self.resource
    }

    /// Directory of the module being parsed.
    pub fn context(&self) -> &Path {
        &self.context
    }

    pub fn add_dependency(&mut self, dependency: Dependency) {
        self.dependencies.push(dependency);
    }

    /// Inject `var name = expression;`. The first definition of a name wins.
    pub fn add_variable(&mut self, name: &str, expression: impl Into<String>) {
        if self.variables.iter().any(|v| v.name == name) {
            return;
        }
        self.variables.push(Variable {
            name: name.to_owned(),
            expression: expression.into(),
        });
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Dependencies sorted by position, plus variables.
    pub fn finish(mut self) -> (Vec<Dependency>, Vec<Variable>) {
        self.dependencies.sort_by_key(|d| d.range().start);
        (self.dependencies, self.variables)
    }
}
