use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::{FileStat, InputFileSystem, OutputFileSystem, now_millis};
use crate::hooks::BoxFuture;

#[derive(Debug, Clone)]
enum Node {
    Dir { mtime: u64 },
    File { content: Vec<u8>, mtime: u64 },
}

/// In-memory file system rooted at `/`.
///
/// Writes require the parent directory to exist, like a real disk, so a
/// missing `mkdirp` shows up as `NotFound`. Every successful `write_file`
/// bumps [`writes`](Self::writes).
#[derive(Debug)]
pub struct MemoryFileSystem {
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
    writes: AtomicUsize,
    clock: AtomicU64,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), Node::Dir { mtime: 0 });
        Self {
            nodes: RwLock::new(nodes),
            writes: AtomicUsize::new(0),
            clock: AtomicU64::new(now_millis()),
        }
    }

    /// Seed a file, creating its ancestors. Does not count as a write.
    pub fn insert_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mtime = self.tick();
        let mut nodes = self.nodes.write();
        if let Some(parent) = path.parent() {
            Self::create_dirs(&mut nodes, parent, mtime);
        }
        nodes.insert(
            path.to_path_buf(),
            Node::File {
                content: content.into(),
                mtime,
            },
        );
    }

    /// Content of a file, if present.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.nodes.read().get(path.as_ref()) {
            Some(Node::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    pub fn contents_str(&self, path: impl AsRef<Path>) -> Option<String> {
        self.contents(path)
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        matches!(self.nodes.read().get(path.as_ref()), Some(Node::Dir { .. }))
    }

    /// Number of successful `write_file` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Strictly increasing modification clock.
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn create_dirs(nodes: &mut BTreeMap<PathBuf, Node>, path: &Path, mtime: u64) {
        for dir in path.ancestors() {
            if dir.as_os_str().is_empty() {
                continue;
            }
            nodes
                .entry(dir.to_path_buf())
                .or_insert(Node::Dir { mtime });
        }
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no such file or directory: {}", path.display()),
        )
    }
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl InputFileSystem for MemoryFileSystem {
    fn stat<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<FileStat>> {
        let result = match self.nodes.read().get(path) {
            Some(Node::Dir { mtime }) => Ok(FileStat {
                is_file: false,
                is_dir: true,
                mtime: *mtime,
                size: 0,
            }),
            Some(Node::File { content, mtime }) => Ok(FileStat {
                is_file: true,
                is_dir: false,
                mtime: *mtime,
                size: content.len() as u64,
            }),
            None => Err(Self::not_found(path)),
        };
        Box::pin(async move { result })
    }

    fn read_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Vec<u8>>> {
        let result = match self.nodes.read().get(path) {
            Some(Node::File { content, .. }) => Ok(content.clone()),
            Some(Node::Dir { .. }) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("is a directory: {}", path.display()),
            )),
            None => Err(Self::not_found(path)),
        };
        Box::pin(async move { result })
    }

    fn read_dir<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Vec<PathBuf>>> {
        let result = {
            let nodes = self.nodes.read();
            match nodes.get(path) {
                Some(Node::Dir { .. }) => Ok(nodes
                    .keys()
                    .filter(|p| p.parent() == Some(path))
                    .cloned()
                    .collect()),
                Some(Node::File { .. }) => Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("not a directory: {}", path.display()),
                )),
                None => Err(Self::not_found(path)),
            }
        };
        Box::pin(async move { result })
    }
}

impl OutputFileSystem for MemoryFileSystem {
    fn mkdirp<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        let mtime = self.tick();
        let result = {
            let mut nodes = self.nodes.write();
            let blocked = path
                .ancestors()
                .find(|dir| matches!(nodes.get(*dir), Some(Node::File { .. })));
            match blocked {
                Some(file) => Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("file exists: {}", file.display()),
                )),
                None => {
                    Self::create_dirs(&mut nodes, path, mtime);
                    Ok(())
                }
            }
        };
        Box::pin(async move { result })
    }

    fn write_file<'a>(
        &'a self,
        path: &'a Path,
        content: &'a [u8],
    ) -> BoxFuture<'a, io::Result<()>> {
        let mtime = self.tick();
        let result = {
            let mut nodes = self.nodes.write();
            let parent_ok = path
                .parent()
                .is_some_and(|parent| matches!(nodes.get(parent), Some(Node::Dir { .. })));
            if parent_ok {
                nodes.insert(
                    path.to_path_buf(),
                    Node::File {
                        content: content.to_vec(),
                        mtime,
                    },
                );
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            } else {
                Err(Self::not_found(path))
            }
        };
        Box::pin(async move { result })
    }
}
