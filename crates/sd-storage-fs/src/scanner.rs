//! Recursive discovery of source files.
//!
//! The scanner walks a content root depth-first and returns the relative
//! paths of files that pass its filters. Directory filters decide whether a
//! directory is descended into; file filters decide whether a regular file is
//! reported. Both work on the entry name, not the full path.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

/// Error raised when part of the tree cannot be read.
#[derive(Debug, thiserror::Error)]
#[error("failed to scan {}: {source}", path.display())]
pub struct ScanError {
    /// Directory or entry that failed.
    pub path: PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: std::io::Error,
}

impl ScanError {
    fn new(path: &Path, source: std::io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Name filter for one kind of entry.
///
/// A name must match `include` (if set) and must not match `exclude` (if set).
#[derive(Debug, Clone, Default)]
struct NameFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl NameFilter {
    fn accepts(&self, name: &str) -> bool {
        if let Some(include) = &self.include
            && !include.is_match(name)
        {
            return false;
        }
        if let Some(exclude) = &self.exclude
            && exclude.is_match(name)
        {
            return false;
        }
        true
    }
}

/// Depth-first source file discovery.
///
/// # Example
///
/// ```no_run
/// use regex::Regex;
/// use sd_storage_fs::Scanner;
///
/// let files = Scanner::new()
///     .exclude_dirs(Regex::new(r"(\.git|node_modules)$").unwrap())
///     .include_files(Regex::new(r"\.(md|markdown)$").unwrap())
///     .scan("/srv/docs".as_ref())
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    dirs: NameFilter,
    files: NameFilter,
}

impl Scanner {
    /// Create a scanner that accepts every entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only descend into directories whose name matches `pattern`.
    #[must_use]
    pub fn include_dirs(mut self, pattern: Regex) -> Self {
        self.dirs.include = Some(pattern);
        self
    }

    /// Never descend into directories whose name matches `pattern`.
    #[must_use]
    pub fn exclude_dirs(mut self, pattern: Regex) -> Self {
        self.dirs.exclude = Some(pattern);
        self
    }

    /// Only report files whose name matches `pattern`.
    #[must_use]
    pub fn include_files(mut self, pattern: Regex) -> Self {
        self.files.include = Some(pattern);
        self
    }

    /// Never report files whose name matches `pattern`.
    #[must_use]
    pub fn exclude_files(mut self, pattern: Regex) -> Self {
        self.files.exclude = Some(pattern);
        self
    }

    /// Scan the whole tree under `root`.
    ///
    /// Returns `/`-joined paths relative to `root`, ordered depth-first with
    /// entries of each directory sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] if `root` or any directory or entry beneath it
    /// cannot be read or stat'ed.
    pub fn scan(&self, root: &Path) -> Result<Vec<String>, ScanError> {
        self.scan_subdir(root, "")
    }

    /// Scan only `sub_dir` (a `/`-separated path relative to `root`).
    ///
    /// Paths are still returned relative to `root`, so `scan_subdir(root, "guide")`
    /// yields `guide/...` entries.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] if `sub_dir` or anything beneath it cannot be read.
    pub fn scan_subdir(&self, root: &Path, sub_dir: &str) -> Result<Vec<String>, ScanError> {
        let prefix = sub_dir.trim_matches('/');
        let start = if prefix.is_empty() {
            root.to_path_buf()
        } else {
            root.join(prefix)
        };
        tracing::debug!(dir = %start.display(), "scanning source files");

        let mut found = Vec::new();
        self.scan_directory(&start, prefix, &mut found)?;
        tracing::debug!(count = found.len(), "scan complete");
        Ok(found)
    }

    fn scan_directory(
        &self,
        dir: &Path,
        rel_prefix: &str,
        found: &mut Vec<String>,
    ) -> Result<(), ScanError> {
        let mut names: Vec<String> = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| ScanError::new(dir, e))? {
            let entry = entry.map_err(|e| ScanError::new(dir, e))?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => {
                    tracing::warn!(dir = %dir.display(), ?name, "skipping non UTF-8 entry");
                }
            }
        }
        names.sort_unstable();

        for name in names {
            let path = dir.join(&name);
            let metadata = fs::metadata(&path).map_err(|e| ScanError::new(&path, e))?;
            let rel = if rel_prefix.is_empty() {
                name.clone()
            } else {
                format!("{rel_prefix}/{name}")
            };

            if metadata.is_dir() {
                if self.dirs.accepts(&name) {
                    self.scan_directory(&path, &rel, found)?;
                } else {
                    tracing::trace!(dir = %rel, "directory filtered out");
                }
            } else if self.files.accepts(&name) {
                tracing::trace!(file = %rel, "found file");
                found.push(rel);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "readme.md");
        touch(root, "guide/setup.md");
        touch(root, "guide/index.markdown");
        touch(root, "guide/img/logo.png");
        touch(root, "guide/.git/HEAD.md");
        touch(root, "api/node_modules/pkg/readme.md");
        touch(root, "api/endpoints.md");
        tmp
    }

    fn markdown_scanner() -> Scanner {
        Scanner::new()
            .exclude_dirs(Regex::new(r"(\.git|\.gitignore|\.idea|node_modules)$").unwrap())
            .include_files(Regex::new(r"\.(md|markdown)$").unwrap())
    }

    #[test]
    fn test_scan_with_filters() {
        let tmp = tree();
        let files = markdown_scanner().scan(tmp.path()).unwrap();
        assert_eq!(
            files,
            vec![
                "api/endpoints.md",
                "guide/index.markdown",
                "guide/setup.md",
                "readme.md",
            ]
        );
    }

    #[test]
    fn test_scan_is_deterministic() {
        let tmp = tree();
        let scanner = markdown_scanner();
        assert_eq!(scanner.scan(tmp.path()).unwrap(), scanner.scan(tmp.path()).unwrap());
    }

    #[test]
    fn test_scan_without_filters_reports_everything() {
        let tmp = tree();
        let files = Scanner::new().scan(tmp.path()).unwrap();
        assert!(files.contains(&"guide/img/logo.png".to_owned()));
        assert!(files.contains(&"guide/.git/HEAD.md".to_owned()));
        assert_eq!(files.len(), 7);
    }

    #[test]
    fn test_exclude_files() {
        let tmp = tree();
        let files = markdown_scanner()
            .exclude_files(Regex::new("^index").unwrap())
            .scan(tmp.path())
            .unwrap();
        assert!(!files.iter().any(|f| f.ends_with("index.markdown")));
    }

    #[test]
    fn test_include_dirs() {
        let tmp = tree();
        let files = markdown_scanner()
            .include_dirs(Regex::new("^guide$").unwrap())
            .scan(tmp.path())
            .unwrap();
        assert_eq!(files, vec!["guide/index.markdown", "guide/setup.md", "readme.md"]);
    }

    #[test]
    fn test_include_and_exclude_both_apply() {
        let tmp = tree();
        let files = Scanner::new()
            .include_dirs(Regex::new("^(api|node_modules|pkg)$").unwrap())
            .exclude_dirs(Regex::new("^node_modules$").unwrap())
            .include_files(Regex::new(r"\.md$").unwrap())
            .exclude_files(Regex::new("^readme").unwrap())
            .scan(tmp.path())
            .unwrap();
        assert_eq!(files, vec!["api/endpoints.md"]);
    }

    #[test]
    fn test_scan_subdir_keeps_root_relative_paths() {
        let tmp = tree();
        let files = markdown_scanner().scan_subdir(tmp.path(), "guide").unwrap();
        assert_eq!(files, vec!["guide/index.markdown", "guide/setup.md"]);
    }

    #[test]
    fn test_missing_root_is_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let err = Scanner::new().scan(&missing).unwrap_err();
        assert_eq!(err.path, missing);
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_error() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tree();
        let locked = tmp.path().join("guide");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores permission bits
        let lock_effective = fs::read_dir(&locked).is_err();
        let result = markdown_scanner().scan(tmp.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if lock_effective {
            let err = result.unwrap_err();
            assert_eq!(err.path, locked);
        } else {
            assert!(result.is_ok());
        }
    }
}
