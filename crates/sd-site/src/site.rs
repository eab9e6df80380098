//! Processing passes and the document service.
//!
//! A [`Site`] owns everything a pass needs: the source tree, the scanner, the
//! compiler, the document store and the repository syncer. A pass runs
//! sync, scan, compile and cache population in that order, then drops cache
//! entries whose source files disappeared and recomputes the context set.
//!
//! # Concurrency
//!
//! Passes are serialized by an internal mutex. Readers never take it: a
//! request arriving during a pass sees, per key, either the previous document
//! or the new one. There is no snapshot isolation across keys.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use regex::Regex;
use sd_cache::{CacheError, DocumentStore, DocumentStoreExt};
use sd_config::{Config, ConfigError, RepoConfig};
use sd_storage_fs::{ScanError, Scanner, SourceDir, SourceError};
use sd_vcs::{GitSync, RepoSpec, RepoSync, SyncError};

use crate::compiler::Compiler;
use crate::document::{CompiledDocument, cache_key, context_of};
use crate::search::{SearchHit, SearchQuery};

/// Error aborting a processing pass.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Repository synchronization failed; nothing was compiled.
    #[error("repository sync failed: {0}")]
    Sync(#[from] SyncError),
    /// The source tree could not be scanned.
    #[error(transparent)]
    Scan(#[from] ScanError),
    /// The source root could not be created.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The document store rejected a write or a key listing.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Outcome of one processing pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Context the pass was restricted to.
    pub scope: Option<String>,
    /// Documents compiled and stored.
    pub compiled: usize,
    /// Files that failed to compile and were skipped.
    pub failed: usize,
    /// Stale cache entries removed.
    pub removed: usize,
    /// Contexts known after the pass.
    pub contexts: usize,
}

/// Settings a [`Site`] is built from.
#[derive(Clone, Debug)]
pub struct SiteConfig {
    /// Root of the source tree.
    pub source_dir: PathBuf,
    /// File names compiled as documents.
    pub markdown_file: Regex,
    /// Directory names skipped while scanning.
    pub exclude_dir: Regex,
    /// Directory names that must match to be scanned.
    pub include_dir: Option<Regex>,
    /// File names skipped while scanning.
    pub exclude_file: Option<Regex>,
    /// File stems that collapse to their directory.
    pub index_pattern: Regex,
    /// Heading level collected into outlines.
    pub outline_level: u8,
    /// Configured repositories.
    pub repos: Vec<RepoConfig>,
    /// Whether passes sync repositories first.
    pub sync_enabled: bool,
}

impl SiteConfig {
    /// Build from the application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a configured pattern does not compile.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let docs = &config.docs_resolved;
        Ok(Self {
            source_dir: docs.source_dir.clone(),
            markdown_file: docs.markdown_file_regex()?,
            exclude_dir: docs.exclude_dir_regex()?,
            include_dir: docs.include_dir_regex()?,
            exclude_file: docs.exclude_file_regex()?,
            index_pattern: docs.index_regex()?,
            outline_level: docs.outline_level,
            repos: config.repos.clone(),
            sync_enabled: config.sync.enabled,
        })
    }
}

/// [`GitSync`] writing into the source directory.
///
/// New working copies are sparse checkouts of the markdown files plus the
/// configured include patterns. An empty include list means full clones.
#[must_use]
pub fn git_sync(config: &Config) -> GitSync {
    let sync = GitSync::new(config.docs_resolved.source_dir.clone(), config.sync.timeout());
    if config.sync.include.is_empty() {
        return sync;
    }
    let patterns = config
        .docs_resolved
        .markdown_ext
        .iter()
        .map(|ext| format!("**/*.{ext}"))
        .chain(config.sync.include.iter().cloned())
        .collect();
    sync.with_sparse_patterns(patterns)
}

/// Capabilities the request router needs from the document pipeline.
pub trait DocumentService: Send + Sync {
    /// Compiled document for a canonical path, with or without leading slash.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store cannot be read. A missing document
    /// is `Ok(None)`.
    fn lookup_document(&self, canonical_path: &str) -> Result<Option<CompiledDocument>, CacheError>;

    /// Known contexts in name order.
    fn list_contexts(&self) -> Vec<String>;

    /// Documents whose raw text matches `query`, in canonical path order.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store cannot be listed or read.
    fn search_raw_text(&self, query: &str) -> Result<Vec<SearchHit>, CacheError>;

    /// Run a processing pass and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] if the pass aborts.
    fn trigger_reprocess(&self, scope: Option<&str>) -> Result<PassSummary, ProcessError>;
}

/// The document pipeline of one serving process.
pub struct Site {
    source: SourceDir,
    scanner: Scanner,
    compiler: Compiler,
    store: Arc<dyn DocumentStore>,
    sync: Arc<dyn RepoSync>,
    repos: Vec<RepoConfig>,
    sync_enabled: bool,
    process_lock: Mutex<()>,
    contexts: RwLock<BTreeSet<String>>,
}

impl Site {
    /// Create a site. Contexts of documents already in `store` are restored.
    #[must_use]
    pub fn new(config: SiteConfig, store: Arc<dyn DocumentStore>, sync: Arc<dyn RepoSync>) -> Self {
        let source = SourceDir::new(config.source_dir);
        let mut scanner = Scanner::new()
            .exclude_dirs(config.exclude_dir)
            .include_files(config.markdown_file);
        if let Some(pattern) = config.include_dir {
            scanner = scanner.include_dirs(pattern);
        }
        if let Some(pattern) = config.exclude_file {
            scanner = scanner.exclude_files(pattern);
        }
        let compiler = Compiler::new(source.clone(), config.index_pattern)
            .with_outline_level(config.outline_level)
            .with_repos(config.repos.clone());

        let contexts = match store.keys() {
            Ok(keys) => keys.iter().filter_map(|key| context_of_key(key)).map(str::to_owned).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "could not list cached documents, starting with no contexts");
                BTreeSet::new()
            }
        };

        Self {
            source,
            scanner,
            compiler,
            store,
            sync,
            repos: config.repos,
            sync_enabled: config.sync_enabled,
            process_lock: Mutex::new(()),
            contexts: RwLock::new(contexts),
        }
    }

    /// Source tree the site is built from.
    #[must_use]
    pub fn source(&self) -> &SourceDir {
        &self.source
    }

    /// Whether `name` is a known context.
    #[must_use]
    pub fn is_context(&self, name: &str) -> bool {
        self.contexts.read().unwrap().contains(name)
    }

    /// Run one processing pass, optionally restricted to the context `scope`.
    ///
    /// Per-file compile failures are logged and skipped; the previous document
    /// for that file, if any, stays in the store. Stale entries inside the
    /// scope are removed at the end of the pass.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] if sync, the scan or a store write fails.
    /// Documents written before the failure stay in the store.
    pub fn process(&self, scope: Option<&str>) -> Result<PassSummary, ProcessError> {
        let _pass = self.process_lock.lock().unwrap();
        let scope = scope.map(|s| s.trim_matches('/')).filter(|s| !s.is_empty());
        tracing::info!(scope = scope.unwrap_or("*"), "processing pass started");

        self.source.ensure_root()?;
        self.sync_repos(scope)?;
        let files = self.scan(scope)?;

        let mut summary = PassSummary {
            scope: scope.map(str::to_owned),
            ..PassSummary::default()
        };
        let mut live_keys = HashSet::new();
        let mut found_contexts = BTreeSet::new();

        for file in &files {
            if let Some(context) = context_of(file) {
                found_contexts.insert(context.to_owned());
            }
            match self.compiler.compile(file) {
                Ok(doc) => {
                    let key = doc.key();
                    self.store.set_json(&key, &doc)?;
                    tracing::debug!(file = %file, key = %key, "compiled document");
                    live_keys.insert(key);
                    summary.compiled += 1;
                }
                Err(e) => {
                    tracing::warn!(file = %file, error = %e, "skipping document");
                    live_keys.insert(cache_key(&self.compiler.canonical_path(file)));
                    summary.failed += 1;
                }
            }
        }

        summary.removed = self.remove_stale(scope, &live_keys)?;
        summary.contexts = self.update_contexts(scope, found_contexts);

        tracing::info!(
            scope = scope.unwrap_or("*"),
            compiled = summary.compiled,
            failed = summary.failed,
            removed = summary.removed,
            contexts = summary.contexts,
            "processing pass finished"
        );
        Ok(summary)
    }

    fn sync_repos(&self, scope: Option<&str>) -> Result<(), SyncError> {
        if !self.sync_enabled {
            return Ok(());
        }
        let specs: Vec<RepoSpec> = self
            .repos
            .iter()
            .filter(|repo| scope.is_none_or(|s| repo.name == s))
            .filter_map(|repo| {
                Some(RepoSpec {
                    name: repo.name.clone(),
                    clone_url: repo.clone_url()?.to_owned(),
                    branch: repo.branch.clone(),
                })
            })
            .collect();
        if specs.is_empty() {
            return Ok(());
        }
        tracing::info!(count = specs.len(), "syncing repositories");
        self.sync.sync(&specs)
    }

    fn scan(&self, scope: Option<&str>) -> Result<Vec<String>, ScanError> {
        let root = self.source.root();
        match scope {
            // A context whose directory is gone has no files left
            Some(context) if !root.join(context).is_dir() => Ok(Vec::new()),
            Some(context) => self.scanner.scan_subdir(root, context),
            None => self.scanner.scan(root),
        }
    }

    fn remove_stale(&self, scope: Option<&str>, live_keys: &HashSet<String>) -> Result<usize, CacheError> {
        let prefix = scope.map(|s| format!("/{s}/"));
        let mut removed = 0;
        for key in self.store.keys()? {
            let in_scope = prefix.as_deref().is_none_or(|p| key.starts_with(p));
            if in_scope && !live_keys.contains(&key) {
                tracing::debug!(key = %key, "removing stale document");
                self.store.remove(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn update_contexts(&self, scope: Option<&str>, found: BTreeSet<String>) -> usize {
        let mut contexts = self.contexts.write().unwrap();
        let next = match scope {
            Some(scope) => {
                let mut next: BTreeSet<String> =
                    contexts.iter().filter(|c| c.as_str() != scope).cloned().collect();
                next.extend(found);
                next
            }
            None => found,
        };
        let count = next.len();
        *contexts = next;
        count
    }
}

/// Context of a cache key; only keys below a directory have one.
fn context_of_key(key: &str) -> Option<&str> {
    key.trim_start_matches('/')
        .split_once('/')
        .map(|(first, _)| first)
        .filter(|first| !first.is_empty())
}

impl DocumentService for Site {
    fn lookup_document(&self, canonical_path: &str) -> Result<Option<CompiledDocument>, CacheError> {
        self.store.get_json(&cache_key(canonical_path))
    }

    fn list_contexts(&self) -> Vec<String> {
        self.contexts.read().unwrap().iter().cloned().collect()
    }

    fn search_raw_text(&self, query: &str) -> Result<Vec<SearchHit>, CacheError> {
        let Some(query) = SearchQuery::new(query) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        for key in self.store.keys()? {
            let doc: CompiledDocument = match self.store.get_json(&key) {
                Ok(Some(doc)) => doc,
                Ok(None) => continue,
                Err(e @ CacheError::Corrupt { .. }) => {
                    tracing::warn!(key = %key, error = %e, "skipping unreadable document in search");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let Some(position) = query.find_in(&doc.raw) {
                hits.push(SearchHit {
                    canonical_path: doc.canonical_path,
                    position,
                });
            }
        }
        Ok(hits)
    }

    fn trigger_reprocess(&self, scope: Option<&str>) -> Result<PassSummary, ProcessError> {
        self.process(scope)
    }
}
