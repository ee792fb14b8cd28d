//! File system abstractions used by the pipeline.
//!
//! The compiler reads through an [`InputFileSystem`] and writes through an
//! independently injectable [`OutputFileSystem`]. Both are object safe so a
//! compiler can hold them as `Arc<dyn ..>` and share them with child compilers.
//!
//! ```text
//! fs/
//! ├── disk.rs     # DiskFileSystem (tokio::fs)
//! └── memory.rs   # MemoryFileSystem (tests, in-process builds)
//! ```

mod disk;
mod memory;

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rustc_hash::FxHashMap;

use crate::hooks::BoxFuture;

pub use disk::DiskFileSystem;
pub use memory::MemoryFileSystem;

/// Metadata returned by [`InputFileSystem::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_file: bool,
    pub is_dir: bool,
    /// Modification time in milliseconds since the epoch.
    pub mtime: u64,
    pub size: u64,
}

/// Read side of the pipeline.
pub trait InputFileSystem: Send + Sync {
    fn stat<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<FileStat>>;

    fn read_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Vec<u8>>>;

    /// Direct children of a directory, sorted.
    fn read_dir<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Vec<PathBuf>>>;
}

/// Write side of the pipeline.
pub trait OutputFileSystem: Send + Sync {
    /// Create a directory and all missing ancestors.
    fn mkdirp<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>>;

    fn write_file<'a>(&'a self, path: &'a Path, content: &'a [u8])
    -> BoxFuture<'a, io::Result<()>>;

    /// Join an output-relative name (always `/`-separated) onto a base path.
    fn join(&self, base: &Path, name: &str) -> PathBuf {
        name.split('/')
            .filter(|part| !part.is_empty())
            .fold(base.to_path_buf(), |path, part| path.join(part))
    }
}

// ============================================================================
// Timestamps
// ============================================================================

/// Modification times observed for files and directories.
///
/// Replaced wholesale by the watcher between cycles; never mutated while a
/// cycle is in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timestamps {
    pub files: FxHashMap<PathBuf, u64>,
    pub dirs: FxHashMap<PathBuf, u64>,
}

impl Timestamps {
    pub fn file(&self, path: &Path) -> Option<u64> {
        self.files.get(path).copied()
    }

    pub fn dir(&self, path: &Path) -> Option<u64> {
        self.dirs.get(path).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }
}

/// Milliseconds since the epoch, saturating to 0 for pre-epoch times.
pub fn millis(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Current time in milliseconds since the epoch.
pub fn now_millis() -> u64 {
    millis(SystemTime::now())
}
