//! Document processing pipeline for servedown.
//!
//! Source files are discovered by the scanner, rewritten by a
//! [`PreprocessChain`], rendered to HTML by a [`Compiler`] and stored as
//! [`CompiledDocument`]s in a document store. [`Site`] runs whole passes and
//! implements [`DocumentService`], the interface the HTTP server consumes.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sd_cache::MemoryStore;
//! use sd_site::{DocumentService, Site, SiteConfig, git_sync};
//!
//! let config = sd_config::Config::load(None, None)?;
//! let store = Arc::new(MemoryStore::new(config.docs_resolved.cache_ttl));
//! let site = Site::new(SiteConfig::from_config(&config)?, store, Arc::new(git_sync(&config)));
//!
//! site.process(None)?;
//! let doc = site.lookup_document("guide/setup")?;
//! ```

mod compiler;
mod document;
mod preprocess;
mod search;
mod site;

pub use compiler::{CompileError, Compiler, MAX_INCLUDE_DEPTH};
pub use document::{CompiledDocument, RepoAttribution, cache_key, canonical_path, context_of};
pub use preprocess::{Includer, PreprocessChain, Rule, RuleContext, RuleError};
pub use search::{SearchHit, SearchQuery, highlight};
pub use site::{DocumentService, PassSummary, ProcessError, Site, SiteConfig, git_sync};
