//! Reading files from the source tree.
//!
//! All paths handed to [`SourceDir`] are `/`-separated and relative to the
//! source root. Paths that would leave the root are rejected before any
//! filesystem access.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Error reading a source file.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The file does not exist (or is not a regular file).
    #[error("file not found: {path}")]
    NotFound {
        /// Requested relative path.
        path: String,
    },
    /// The path escapes the source root or is otherwise unusable.
    #[error("invalid source path: {path}")]
    InvalidPath {
        /// Requested relative path.
        path: String,
    },
    /// Any other I/O failure.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Requested relative path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    /// Whether this is a missing file rather than a read failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    fn from_io(path: &str, source: std::io::Error) -> Self {
        if source.kind() == ErrorKind::NotFound {
            Self::NotFound {
                path: path.to_owned(),
            }
        } else {
            Self::Io {
                path: path.to_owned(),
                source,
            }
        }
    }
}

/// Read access to a source tree.
#[derive(Debug, Clone)]
pub struct SourceDir {
    root: PathBuf,
}

impl SourceDir {
    /// Create a handle for the tree at `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Source root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if the directory cannot be created.
    pub fn ensure_root(&self) -> Result<(), SourceError> {
        fs::create_dir_all(&self.root).map_err(|source| SourceError::Io {
            path: self.root.display().to_string(),
            source,
        })
    }

    /// Absolute path of a relative source path.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidPath`] for paths with `..`, root or
    /// drive components.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf, SourceError> {
        let rel_path = Path::new(rel.trim_start_matches('/'));
        let escapes = rel_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(SourceError::InvalidPath {
                path: rel.to_owned(),
            });
        }
        Ok(self.root.join(rel_path))
    }

    /// Read a source file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NotFound`] if the file is missing and
    /// [`SourceError::Io`] for any other read failure (including invalid UTF-8).
    pub fn read_to_string(&self, rel: &str) -> Result<String, SourceError> {
        let path = self.resolve(rel)?;
        fs::read_to_string(&path).map_err(|e| SourceError::from_io(rel, e))
    }

    /// Read any regular file verbatim.
    ///
    /// Directories read as [`SourceError::NotFound`] so callers can fall
    /// through to a not-found response.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NotFound`], [`SourceError::InvalidPath`] or
    /// [`SourceError::Io`].
    pub fn read_raw(&self, rel: &str) -> Result<Vec<u8>, SourceError> {
        let path = self.resolve(rel)?;
        let metadata = fs::metadata(&path).map_err(|e| SourceError::from_io(rel, e))?;
        if !metadata.is_file() {
            return Err(SourceError::NotFound {
                path: rel.to_owned(),
            });
        }
        fs::read(&path).map_err(|e| SourceError::from_io(rel, e))
    }
}

/// Resolve `target` against the directory of `current_file`.
///
/// A target starting with `/` is taken from the source root. `.` and `..`
/// segments are folded lexically; the result is a `/`-joined path relative to
/// the root.
///
/// # Errors
///
/// Returns [`SourceError::InvalidPath`] if `..` climbs above the root.
///
/// # Example
///
/// ```
/// use sd_storage_fs::resolve_relative;
///
/// assert_eq!(resolve_relative("guide/setup.md", "parts/a.md").unwrap(), "guide/parts/a.md");
/// assert_eq!(resolve_relative("guide/setup.md", "../api/b.md").unwrap(), "api/b.md");
/// assert_eq!(resolve_relative("guide/setup.md", "/shared/c.md").unwrap(), "shared/c.md");
/// ```
pub fn resolve_relative(current_file: &str, target: &str) -> Result<String, SourceError> {
    let mut segments: Vec<&str> = Vec::new();
    if !target.starts_with('/') {
        segments.extend(current_file.split('/').filter(|s| !s.is_empty()));
        segments.pop();
    }

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(SourceError::InvalidPath {
                        path: target.to_owned(),
                    });
                }
            }
            other => segments.push(other),
        }
    }

    Ok(segments.join("/"))
}
