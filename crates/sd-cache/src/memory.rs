//! In-process store.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::entry::{expiry_from_now, is_live};
use crate::{CacheError, DocumentStore};

struct Entry {
    expires_at: u64,
    data: Arc<[u8]>,
}

/// [`DocumentStore`] backed by a map in process memory.
///
/// Never returns [`CacheError`]; every operation is infallible.
pub struct MemoryStore {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create an empty store whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .get(key)
            .filter(|entry| is_live(entry.expires_at))
            .map(|entry| entry.data.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let entry = Entry {
            expires_at: expiry_from_now(self.ttl),
            data: Arc::from(value),
        };
        self.entries.write().unwrap().insert(key.to_owned(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<BTreeSet<String>, CacheError> {
        Ok(self.entries.read().unwrap().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_set_and_get() {
        let store = MemoryStore::new(HOUR);
        store.set("/guide", b"hello").unwrap();
        assert_eq!(store.get("/guide").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_never_set_key_is_absent_not_error() {
        let store = MemoryStore::new(HOUR);
        assert_eq!(store.get("/nothing").unwrap(), None);
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let store = MemoryStore::new(HOUR);
        store.set("/k", b"first").unwrap();
        store.set("/k", b"second").unwrap();
        assert_eq!(store.get("/k").unwrap(), Some(b"second".to_vec()));
    }

    #[test]
    fn test_remove_and_keys() {
        let store = MemoryStore::new(HOUR);
        store.set("/a", b"1").unwrap();
        store.set("/b/", b"2").unwrap();
        store.remove("/a").unwrap();
        store.remove("/never-there").unwrap();

        let keys: Vec<_> = store.keys().unwrap().into_iter().collect();
        assert_eq!(keys, vec!["/b/".to_owned()]);
        assert_eq!(store.get("/a").unwrap(), None);
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let store = MemoryStore::new(Duration::ZERO);
        store.set("/k", b"gone").unwrap();
        assert_eq!(store.get("/k").unwrap(), None);
    }
}
