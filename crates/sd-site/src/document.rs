//! Compiled document model and path derivation.

use regex::Regex;
use sd_config::RepoConfig;
use sd_renderer::OutlineEntry;
use serde::{Deserialize, Serialize};

/// One source file after preprocessing and rendering.
///
/// This is the record stored in the document cache under [`Self::key`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledDocument {
    /// Request path without the leading slash (`""`, `guide/`, `guide/setup`).
    pub canonical_path: String,
    /// Source file path relative to the source root.
    pub source_path: String,
    /// Rendered HTML fragment.
    pub html: String,
    /// Raw source text, kept for search.
    pub raw: String,
    /// Outline entries in document order.
    pub outline: Vec<OutlineEntry>,
    /// Owning repository, if the file's context is a configured repository.
    pub repo: Option<RepoAttribution>,
}

impl CompiledDocument {
    /// Cache key: the canonical path with a leading slash.
    #[must_use]
    pub fn key(&self) -> String {
        cache_key(&self.canonical_path)
    }

    /// Context (first path segment) of the source file.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        context_of(&self.source_path)
    }
}

/// Repository a document was synced from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoAttribution {
    /// Repository (and context) name.
    pub name: String,
    /// Base URL of the repository, if known.
    pub url: Option<String>,
    /// Link to the document source in the repository web view.
    pub file_url: Option<String>,
}

impl RepoAttribution {
    /// Build the attribution of `source_path` from its repository descriptor.
    ///
    /// The file URL is the base URL followed by the repository's file pattern,
    /// where `{{file}}` is the path inside the repository and `{{fileName}}`
    /// the same path without its extension. Without a pattern the file URL is
    /// the base URL alone.
    #[must_use]
    pub fn for_file(repo: &RepoConfig, source_path: &str) -> Self {
        let file_url = repo.base_url().map(|base| {
            let Some(pattern) = repo.file_pattern.as_deref() else {
                return base.to_owned();
            };
            let in_repo = path_in_context(source_path);
            let without_ext = strip_extension(&in_repo);
            let suffix = pattern
                .replace("{{file}}", &in_repo)
                .replace("{{fileName}}", without_ext);
            format!("{base}{suffix}")
        });

        Self {
            name: repo.name.clone(),
            url: repo.base_url().map(str::to_owned),
            file_url,
        }
    }
}

/// Cache key for a canonical path.
#[must_use]
pub fn cache_key(canonical_path: &str) -> String {
    format!("/{}", canonical_path.trim_start_matches('/'))
}

/// First path segment of a source file that lives in a directory.
///
/// Files at the source root belong to no context.
#[must_use]
pub fn context_of(source_path: &str) -> Option<&str> {
    let trimmed = source_path.trim_start_matches('/');
    trimmed
        .split_once('/')
        .map(|(first, _)| first)
        .filter(|first| !first.is_empty())
}

/// Canonical request path of a source file.
///
/// The extension is stripped. When the remaining file name matches
/// `index_pattern`, the path collapses to its directory with a trailing
/// slash; an index file at the root collapses to `""`.
#[must_use]
pub fn canonical_path(source_path: &str, index_pattern: &Regex) -> String {
    let path = strip_extension(source_path.trim_start_matches('/'));
    let (dir, stem) = match path.rsplit_once('/') {
        Some((dir, stem)) => (Some(dir), stem),
        None => (None, path),
    };

    if !index_pattern.is_match(stem) {
        return path.to_owned();
    }
    match dir {
        Some(dir) => format!("{dir}/"),
        None => String::new(),
    }
}

/// Path with the extension of its last segment removed.
fn strip_extension(path: &str) -> &str {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..name_start + dot],
        _ => path,
    }
}

/// Path inside the context directory (first segment removed, empty segments dropped).
fn path_in_context(source_path: &str) -> String {
    source_path
        .split('/')
        .filter(|s| !s.is_empty())
        .skip(1)
        .collect::<Vec<_>>()
        .join("/")
}
