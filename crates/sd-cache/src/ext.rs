//! Extension trait for [`DocumentStore`] with typed convenience methods.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{CacheError, DocumentStore};

/// Typed convenience methods for [`DocumentStore`].
///
/// Values are stored as JSON so file-backed records stay human-readable.
/// Implemented as default methods on an extension trait so that
/// [`DocumentStore`] stays object-safe and implementors only handle bytes.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use sd_cache::{DocumentStoreExt, MemoryStore};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Page { title: String }
///
/// let store = MemoryStore::new(Duration::from_secs(60));
/// store.set_json("/page", &Page { title: "Hello".into() }).unwrap();
/// let page: Option<Page> = store.get_json("/page").unwrap();
/// assert_eq!(page.unwrap().title, "Hello");
/// ```
pub trait DocumentStoreExt: DocumentStore {
    /// Retrieve a JSON-deserialized value.
    ///
    /// A record that exists but does not decode is reported as
    /// [`CacheError::Corrupt`], not as a miss.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(bytes) = self.get(key)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CacheError::corrupt(key, e.to_string()))
    }

    /// Store a value as JSON.
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value).map_err(|e| CacheError::corrupt(key, e.to_string()))?;
        self.set(key, &bytes)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}
