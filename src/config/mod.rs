//! Compiler configuration and `weft.toml` loading.
//!
//! # Sections
//!
//! | Section      | Purpose                                           |
//! |--------------|---------------------------------------------------|
//! | top level    | `context`, `entry`, records paths                 |
//! | `[output]`   | output directory, filename template, public path  |
//! | `[resolve]`  | extension fallbacks and module directories        |
//! | `[node]`     | `__filename` / `__dirname` shims                  |
//! | `[watch]`    | aggregation delay for watch mode                  |
//!
//! [`CompilerOptions`] is a plain value type: child compilers receive a deep
//! copy with output overrides applied through
//! [`CompilerOptions::with_output_overrides`].

mod error;
mod path;

pub use error::ConfigError;
pub use path::{absolutize, clean, normalize_path_separators, relative_to};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default config file name.
pub const CONFIG_FILE: &str = "weft.toml";

// ============================================================================
// root configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerOptions {
    /// Base directory for entry requests and relative shims.
    pub context: PathBuf,

    /// Entry name → request, resolved against `context`.
    pub entry: BTreeMap<String, String>,

    pub output: OutputOptions,

    /// Shorthand setting both records paths.
    pub records_path: Option<PathBuf>,
    pub records_input_path: Option<PathBuf>,
    pub records_output_path: Option<PathBuf>,

    pub resolve: ResolveOptions,

    pub node: NodeOptions,

    pub watch: WatchOptions,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            context: PathBuf::from("."),
            entry: BTreeMap::new(),
            output: OutputOptions::default(),
            records_path: None,
            records_input_path: None,
            records_output_path: None,
            resolve: ResolveOptions::default(),
            node: NodeOptions::default(),
            watch: WatchOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputOptions {
    pub path: PathBuf,
    /// Asset name template; `[name]` and `[id]` are substituted per chunk.
    pub filename: String,
    pub public_path: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("dist"),
            filename: "[name].js".to_owned(),
            public_path: String::new(),
        }
    }
}

/// Output fields a child compiler may override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputOverrides {
    pub path: Option<PathBuf>,
    pub filename: Option<String>,
    pub public_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveOptions {
    /// Suffixes tried in order; `""` means "as written".
    pub extensions: Vec<String>,
    /// Directory names searched upward for bare requests.
    pub modules: Vec<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            extensions: vec![String::new(), ".js".to_owned(), ".json".to_owned()],
            modules: vec!["node_modules".to_owned()],
        }
    }
}

/// How a Node.js free variable is rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShim {
    /// Fixed placeholder value.
    #[default]
    Mock,
    /// Path relative to `context`.
    Relative,
    /// Leave the identifier untouched.
    Off,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeOptions {
    pub filename: NodeShim,
    pub dirname: NodeShim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchOptions {
    /// Events are aggregated for this long before a rebuild.
    pub delay_ms: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self { delay_ms: 300 }
    }
}

impl CompilerOptions {
    /// Parse configuration from a TOML string without resolving paths.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `weft.toml`, resolve its paths against the file's directory and
    /// validate the result.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(config_path)
            .map_err(|err| ConfigError::Io(config_path.to_path_buf(), err))?;
        let mut options = Self::from_str(&content)?;

        let root = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let root = std::env::current_dir()
            .map(|cwd| absolutize(&cwd, &root))
            .unwrap_or(root);

        options.normalize_paths(&root);
        options.validate()?;
        Ok(options)
    }

    /// Resolve every configured path against `root`, once.
    ///
    /// Separators are normalized here so later phases can rely on
    /// [`Path::parent`] alone.
    pub fn normalize_paths(&mut self, root: &Path) {
        self.context = absolutize(root, &self.context);
        self.output.path = absolutize(root, &self.output.path);

        let resolve = |p: &mut Option<PathBuf>| {
            if let Some(path) = p.take() {
                *p = Some(absolutize(root, &path));
            }
        };
        resolve(&mut self.records_path);
        resolve(&mut self.records_input_path);
        resolve(&mut self.records_output_path);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entry.is_empty() {
            return Err(ConfigError::Validation(
                "`entry` must name at least one entry point".into(),
            ));
        }
        if let Some((name, _)) = self.entry.iter().find(|(_, request)| request.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "entry `{name}` has an empty request"
            )));
        }
        if self.output.filename.is_empty() {
            return Err(ConfigError::Validation(
                "`output.filename` must not be empty".into(),
            ));
        }
        let templated = ["[name]", "[id]"]
            .iter()
            .any(|token| self.output.filename.contains(token));
        if self.entry.len() > 1 && !templated {
            return Err(ConfigError::Validation(format!(
                "`output.filename = \"{}\"` would overwrite itself for {} entries; use [name] or [id]",
                self.output.filename,
                self.entry.len()
            )));
        }
        Ok(())
    }

    /// Records file read before each top-level build.
    pub fn records_input(&self) -> Option<&Path> {
        self.records_input_path
            .as_deref()
            .or(self.records_path.as_deref())
    }

    /// Records file written after each successful build.
    pub fn records_output(&self) -> Option<&Path> {
        self.records_output_path
            .as_deref()
            .or(self.records_path.as_deref())
    }

    pub fn watch_delay(&self) -> Duration {
        Duration::from_millis(self.watch.delay_ms)
    }

    /// Deep copy with the given output fields overlaid.
    pub fn with_output_overrides(&self, overrides: &OutputOverrides) -> Self {
        let mut options = self.clone();
        if let Some(path) = &overrides.path {
            options.output.path = path.clone();
        }
        if let Some(filename) = &overrides.filename {
            options.output.filename = filename.clone();
        }
        if let Some(public_path) = &overrides.public_path {
            options.output.public_path = public_path.clone();
        }
        options
    }
}

// ============================================================================
// tests
// ============================================================================
