//! Document cache for servedown.
//!
//! This crate provides the keyed store that holds compiled documents between a
//! processing pass and the requests that read them. One trait forms the core API:
//!
//! - [`DocumentStore`]: Key-value store with per-key atomic writes
//!
//! # Implementations
//!
//! - [`MemoryStore`]: Process-memory map (the default)
//! - [`FileStore`]: One file per key under a local directory, with version validation
//!
//! # Missing vs. unavailable
//!
//! A lookup for a key that was never stored (or whose entry expired) returns
//! `Ok(None)`. Backing-store failures return [`CacheError`]. Callers must not
//! treat the two the same way.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use sd_cache::{DocumentStore, MemoryStore};
//!
//! let store = MemoryStore::new(Duration::from_secs(60));
//! store.set("/guide", b"<p>hello</p>").unwrap();
//! assert_eq!(store.get("/guide").unwrap(), Some(b"<p>hello</p>".to_vec()));
//! assert_eq!(store.get("/missing").unwrap(), None);
//! ```

mod entry;
mod ext;
mod file;
mod memory;

use std::collections::BTreeSet;
use std::path::PathBuf;

pub use ext::DocumentStoreExt;
pub use file::FileStore;
pub use memory::MemoryStore;

/// Error returned when the backing store cannot serve a request.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backing store could not be read or written.
    #[error("cache unavailable: {source}")]
    Unavailable {
        /// Location that failed, if the store is file-backed.
        path: Option<PathBuf>,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A stored record exists but cannot be decoded.
    #[error("corrupt cache entry for {key}: {message}")]
    Corrupt {
        /// Cache key of the broken record.
        key: String,
        /// What went wrong while decoding.
        message: String,
    },
}

impl CacheError {
    pub(crate) fn unavailable(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Unavailable { path, source }
    }

    pub(crate) fn corrupt(key: &str, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.to_owned(),
            message: message.into(),
        }
    }
}

/// Keyed store for compiled documents.
///
/// Keys are canonical request paths with a leading slash (e.g. `/`, `/guide`,
/// `/docs/`). Values are opaque bytes; use [`DocumentStoreExt`] for typed access.
///
/// Every `set` replaces the previous value for the key atomically: a concurrent
/// `get` sees either the old value or the new one, never a partial write.
pub trait DocumentStore: Send + Sync {
    /// Retrieve a value.
    ///
    /// Returns `Ok(None)` if the key was never set, was removed, or expired.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a value, replacing any previous one.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// All keys currently stored, including expired entries not yet evicted.
    fn keys(&self) -> Result<BTreeSet<String>, CacheError>;
}
