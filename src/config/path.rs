//! Path normalization applied once at configuration time.

use std::path::{Component, Path, PathBuf};

/// Rewrite foreign separators to the platform one.
///
/// On Unix a `\` in a configured path is always meant as a separator, so
/// `out\records.json` becomes `out/records.json`. Windows accepts both
/// separators natively and is left alone.
pub fn normalize_path_separators(path: &Path) -> PathBuf {
    if std::path::MAIN_SEPARATOR == '/' {
        let text = path.to_string_lossy();
        if text.contains('\\') {
            return PathBuf::from(text.replace('\\', "/"));
        }
    }
    path.to_path_buf()
}

/// Lexically resolve `path` against `root`: separators normalized, `.`
/// dropped and `..` folded. The file system is not consulted.
pub fn absolutize(root: &Path, path: &Path) -> PathBuf {
    let path = normalize_path_separators(path);
    let joined = if path.is_absolute() {
        path
    } else {
        normalize_path_separators(root).join(path)
    };
    clean(&joined)
}

/// Drop `.` components and fold `..` without touching the file system.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `path` relative to `base`, `/`-separated, for display and shims.
pub fn relative_to(base: &Path, path: &Path) -> String {
    let base: Vec<_> = base.components().collect();
    let target: Vec<_> = path.components().collect();
    let shared = base
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = std::iter::repeat_n("..".to_owned(), base.len() - shared).collect();
    parts.extend(
        target[shared..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_backslashes_become_separators() {
        assert_eq!(
            normalize_path_separators(Path::new("dist\\cache\\records.json")),
            PathBuf::from("dist/cache/records.json")
        );
        assert_eq!(
            normalize_path_separators(Path::new("dist\\records.json")).parent(),
            Some(Path::new("dist"))
        );
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(
            absolutize(Path::new("/project"), Path::new("./dist/../out")),
            PathBuf::from("/project/out")
        );
        assert_eq!(
            absolutize(Path::new("/project"), Path::new("/abs/x")),
            PathBuf::from("/abs/x")
        );
    }

    #[test]
    fn test_relative_to() {
        let base = Path::new("/project");
        assert_eq!(relative_to(base, Path::new("/project/src/a.js")), "src/a.js");
        assert_eq!(relative_to(base, Path::new("/other/b.js")), "../other/b.js");
        assert_eq!(relative_to(base, base), "");
    }
}
