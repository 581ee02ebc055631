//! The disk tier of the cache.
//!
//! Entries are serialized with `bincode`, one file per key, prefixed with a
//! small integrity envelope (a magic tag and a checksum over the payload).
//! The envelope is what turns a torn or otherwise corrupted file into a
//! detectable condition, since a bare `bincode` payload of a fixed-size type
//! would decode arbitrary garbage without complaint.
//!
//! All failures on this level are recoverable by design: they are reported
//! on the warnings channel (`tracing::warn!`) and degrade to a cache miss on
//! read, or to an unpersisted result on write. The wrapped computation is
//! never failed by the store.
//!
//! Concurrent writers to the same key are last-writer-wins with no atomicity
//! across the full write. A reader racing a writer may observe a torn file,
//! which the integrity check absorbs by falling back to recomputation.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use crate::dir::DirPolicy;
use crate::error::CacheError;

const MAGIC: &[u8; 4] = b"CBL1";
const CHECKSUM_LEN: usize = 8;

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(payload);
    let mut sum = [0; CHECKSUM_LEN];
    sum.copy_from_slice(&digest[..CHECKSUM_LEN]);
    sum
}

/// Validates the envelope and returns the enclosed payload.
fn unframe(bytes: &[u8]) -> Option<&[u8]> {
    let rest = bytes.strip_prefix(MAGIC)?;
    let (sum, payload) = rest.split_at_checked(CHECKSUM_LEN)?;
    (sum == checksum(payload)).then_some(payload)
}

#[derive(Debug, Clone)]
pub(crate) struct Store {
    dir: DirPolicy,
}

impl Store {
    pub(crate) fn new(dir: DirPolicy) -> Self {
        Store { dir }
    }

    /// Whether an entry exists on disk for `file_name`.
    pub(crate) fn contains(&self, file_name: &str) -> bool {
        self.dir.entry_path(file_name).is_file()
    }

    /// Returns the decoded entry, or `None` when the file is missing, empty,
    /// or cannot be decoded.
    pub(crate) fn read<T: DeserializeOwned>(&self, qual: &str, file_name: &str) -> Option<T> {
        let path = self.dir.entry_path(file_name);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(
                    function = qual,
                    file = %path.display(),
                    error = %err,
                    "could not read cache entry"
                );
                return None;
            }
        };

        // A zero-length entry carries no value. It is indistinguishable from
        // a concurrent writer that has opened but not yet filled the file, so
        // it is treated as a miss.
        if bytes.is_empty() {
            return None;
        }

        let Some(payload) = unframe(&bytes) else {
            tracing::warn!(
                function = qual,
                file = %path.display(),
                "cache entry failed its integrity check"
            );
            return None;
        };

        match bincode::deserialize(payload) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(
                    function = qual,
                    file = %path.display(),
                    error = %err,
                    "could not decode cache entry"
                );
                None
            }
        }
    }

    /// Persists `value` under `file_name` and propagates the cache
    /// directory's group and permission mask to the new file.
    ///
    /// Failures are reported as warnings; the in-memory value remains usable
    /// by the caller either way.
    pub(crate) fn write<T: Serialize>(&self, qual: &str, file_name: &str, value: &T) {
        let path = self.dir.entry_path(file_name);
        if let Err(err) = self.try_write(&path, value) {
            tracing::warn!(
                function = qual,
                file = %path.display(),
                error = %err,
                "could not write cache entry"
            );
        }
    }

    fn try_write<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), CacheError> {
        let payload = bincode::serialize(value)?;

        let mut bytes = Vec::with_capacity(MAGIC.len() + CHECKSUM_LEN + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&checksum(&payload));
        bytes.extend_from_slice(&payload);

        fs::write(path, bytes)?;
        self.dir.apply(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(root: &Path) -> Store {
        Store::new(DirPolicy::resolve(root.to_path_buf()).unwrap())
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let value = vec![vec![1.5f64, 2.5], vec![-3.0]];
        store.write("f", "f._1.cache", &value);
        assert!(store.contains("f._1.cache"));
        assert_eq!(store.read::<Vec<Vec<f64>>>("f", "f._1.cache"), Some(value));
    }

    #[test]
    fn test_missing_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert_eq!(store.read::<u32>("f", "f._1.cache"), None);
    }

    #[test]
    fn test_empty_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        fs::write(dir.path().join("f._1.cache"), b"").unwrap();
        assert_eq!(store.read::<u32>("f", "f._1.cache"), None);
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        fs::write(dir.path().join("f._1.cache"), b"\xff\xfe garbage").unwrap();
        assert_eq!(store.read::<Vec<String>>("f", "f._1.cache"), None);
    }

    #[test]
    fn test_torn_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store.write("f", "f._1.cache", &vec![1u64, 2, 3]);

        // simulate a reader racing a writer mid-write
        let path = dir.path().join("f._1.cache");
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        assert_eq!(store.read::<Vec<u64>>("f", "f._1.cache"), None);
    }
}
