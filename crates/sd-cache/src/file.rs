//! File-based store implementation.
//!
//! [`FileStore`] keeps one file per key in a flat directory. The file name is
//! the hex SHA-256 of the key with an `.entry` suffix, so names have a fixed
//! length whatever the key looks like. Each file holds the framed record
//! described in the `entry` module, whose data is the key followed by the
//! value:
//!
//! ```text
//! [expires_at: u64 LE][key_len: u32 LE][key bytes][value bytes]
//! ```
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the entry, so readers never observe a partially written record.
//!
//! On open, [`FileStore`] validates a `VERSION` file in the store root. If the
//! version mismatches or is missing, the whole directory is wiped and recreated.
//! This ensures records from a previous build are never decoded.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::entry::{HEADER_LEN, decode, encode, expiry_from_now, is_live};
use crate::{CacheError, DocumentStore};

/// Suffix marking entry files (temporary files and `VERSION` never carry it).
const ENTRY_SUFFIX: &str = ".entry";

/// Size of the key length prefix in bytes.
const KEY_LEN_BYTES: usize = 4;

/// File-based [`DocumentStore`] rooted at a directory on disk.
///
/// Directory layout:
/// ```text
/// {root}/
/// +-- VERSION              # contains the store version string
/// +-- 8a5edab2...e3.entry  # one file per key, named by SHA-256 of the key
/// ```
pub struct FileStore {
    root: PathBuf,
    ttl: Duration,
}

impl FileStore {
    /// Open a store at `root`, validating its version.
    ///
    /// If the `VERSION` file inside `root` does not match `version`, the store
    /// directory is removed and recreated with the new version.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the directory or the `VERSION`
    /// file cannot be created.
    pub fn open(root: PathBuf, version: &str, ttl: Duration) -> Result<Self, CacheError> {
        validate_version(&root, version)?;
        Ok(Self { root, ttl })
    }

    /// Store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.root.join(format!("{}{ENTRY_SUFFIX}", hex::encode(digest)))
    }
}

/// Prefix `value` with the key it is stored under.
fn frame_key(key: &str, value: &[u8]) -> Vec<u8> {
    let len = u32::try_from(key.len()).unwrap_or(u32::MAX);
    let mut buf = Vec::with_capacity(KEY_LEN_BYTES + key.len() + value.len());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(value);
    buf
}

/// Split entry data into the stored key and the value.
fn split_key(data: &[u8]) -> Option<(&str, &[u8])> {
    let (len, rest) = data.split_at_checked(KEY_LEN_BYTES)?;
    let len = usize::try_from(u32::from_le_bytes(len.try_into().ok()?)).ok()?;
    let (key, value) = rest.split_at_checked(len)?;
    Some((std::str::from_utf8(key).ok()?, value))
}

/// Read only the key of the entry file at `path`.
fn read_key(path: &Path) -> std::io::Result<Option<String>> {
    let mut file = File::open(path)?;
    let mut prefix = [0u8; HEADER_LEN + KEY_LEN_BYTES];
    if let Err(e) = file.read_exact(&mut prefix) {
        return if e.kind() == ErrorKind::UnexpectedEof { Ok(None) } else { Err(e) };
    }
    let mut len = [0u8; KEY_LEN_BYTES];
    len.copy_from_slice(&prefix[HEADER_LEN..]);
    let len = u32::from_le_bytes(len);
    let mut key = Vec::new();
    file.take(u64::from(len)).read_to_end(&mut key)?;
    if u64::try_from(key.len()).ok() != Some(u64::from(len)) {
        return Ok(None);
    }
    Ok(String::from_utf8(key).ok())
}

impl DocumentStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.entry_path(key);
        let record = match fs::read(&path) {
            Ok(record) => record,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::unavailable(e, Some(path))),
        };

        let (expires_at, data) =
            decode(&record).ok_or_else(|| CacheError::corrupt(key, "truncated header"))?;
        let (stored_key, value) =
            split_key(data).ok_or_else(|| CacheError::corrupt(key, "truncated key"))?;
        if stored_key != key {
            return Err(CacheError::corrupt(key, format!("entry holds key {stored_key}")));
        }
        if !is_live(expires_at) {
            return Ok(None);
        }
        Ok(Some(value.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        let record = encode(expiry_from_now(self.ttl), &frame_key(key, value));

        fs::create_dir_all(&self.root)
            .map_err(|e| CacheError::unavailable(e, Some(self.root.clone())))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| CacheError::unavailable(e, Some(self.root.clone())))?;
        tmp.write_all(&record)
            .map_err(|e| CacheError::unavailable(e, Some(tmp.path().to_path_buf())))?;
        tmp.persist(&path)
            .map_err(|e| CacheError::unavailable(e.error, Some(path)))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::unavailable(e, Some(path))),
        }
    }

    fn keys(&self) -> Result<BTreeSet<String>, CacheError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(CacheError::unavailable(e, Some(self.root.clone()))),
        };

        let mut keys = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::unavailable(e, Some(self.root.clone())))?;
            let path = entry.path();
            if !path.to_str().is_some_and(|p| p.ends_with(ENTRY_SUFFIX)) {
                continue;
            }
            match read_key(&path) {
                Ok(Some(key)) => {
                    keys.insert(key);
                }
                Ok(None) => tracing::warn!(file = %path.display(), "skipping cache entry without a key"),
                // Removed between listing and reading
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::unavailable(e, Some(path))),
            }
        }
        Ok(keys)
    }
}

/// Validate the store version, wiping the directory on mismatch.
fn validate_version(root: &Path, version: &str) -> Result<(), CacheError> {
    let version_file = root.join("VERSION");

    match fs::read_to_string(&version_file) {
        Ok(stored) if stored == version => {
            tracing::debug!("cache version matches: {version}");
            return Ok(());
        }
        Ok(stored) => {
            tracing::info!(
                "cache version mismatch (stored={stored}, current={version}), wiping cache"
            );
        }
        Err(_) => {
            tracing::info!("no cache VERSION file found, initializing cache");
        }
    }

    if root.exists()
        && let Err(e) = fs::remove_dir_all(root)
    {
        tracing::warn!("failed to remove cache directory: {e}");
    }
    fs::create_dir_all(root).map_err(|e| CacheError::unavailable(e, Some(root.to_path_buf())))?;
    fs::write(&version_file, version)
        .map_err(|e| CacheError::unavailable(e, Some(version_file.clone())))?;
    Ok(())
}
