use std::io;
use std::path::{Path, PathBuf};

use super::{FileStat, InputFileSystem, OutputFileSystem, millis};
use crate::hooks::BoxFuture;

/// Real file system backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFileSystem;

impl InputFileSystem for DiskFileSystem {
    fn stat<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<FileStat>> {
        Box::pin(async move {
            let meta = tokio::fs::metadata(path).await?;
            Ok(FileStat {
                is_file: meta.is_file(),
                is_dir: meta.is_dir(),
                mtime: meta.modified().map(millis).unwrap_or(0),
                size: meta.len(),
            })
        })
    }

    fn read_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Vec<u8>>> {
        Box::pin(tokio::fs::read(path))
    }

    fn read_dir<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Vec<PathBuf>>> {
        Box::pin(async move {
            let mut entries = Vec::new();
            let mut dir = tokio::fs::read_dir(path).await?;
            while let Some(entry) = dir.next_entry().await? {
                entries.push(entry.path());
            }
            entries.sort();
            Ok(entries)
        })
    }
}

impl OutputFileSystem for DiskFileSystem {
    fn mkdirp<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(tokio::fs::create_dir_all(path))
    }

    fn write_file<'a>(
        &'a self,
        path: &'a Path,
        content: &'a [u8],
    ) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(tokio::fs::write(path, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_disk_roundtrip() {
        let dir = TempDir::new().unwrap();
        let fs = DiskFileSystem;
        let nested = dir.path().join("a/b");

        fs.mkdirp(&nested).await.unwrap();
        let file = nested.join("x.js");
        fs.write_file(&file, b"module.exports = 1;").await.unwrap();

        let stat = fs.stat(&file).await.unwrap();
        assert!(stat.is_file);
        assert_eq!(stat.size, 19);
        assert!(stat.mtime > 0);
        assert_eq!(fs.read_file(&file).await.unwrap(), b"module.exports = 1;");
        assert_eq!(fs.read_dir(&nested).await.unwrap(), vec![file]);
    }

    #[tokio::test]
    async fn test_disk_stat_missing() {
        let dir = TempDir::new().unwrap();
        let err = DiskFileSystem
            .stat(&dir.path().join("missing"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
