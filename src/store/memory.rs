//! In-memory model store using `DashMap`.
//!
//! Data is lost on process restart; used by tests and dry runs.

use dashmap::DashMap;

use super::ModelStore;
use crate::Result;

/// In-memory blob store keyed by `(bucket, key)`.
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    blobs: DashMap<(String, String), Vec<u8>>,
}

impl MemoryModelStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blobs: DashMap::new(),
        }
    }

    /// Get the number of blobs in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

fn entry_key(bucket: &str, key: &str) -> (String, String) {
    (bucket.to_string(), key.to_string())
}

impl ModelStore for MemoryModelStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .get(&entry_key(bucket, key))
            .map(|v| v.value().clone()))
    }

    fn put(&self, bucket: &str, key: &str, value: Vec<u8>) -> Result<()> {
        self.blobs.insert(entry_key(bucket, key), value);
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.blobs.remove(&entry_key(bucket, key));
        Ok(())
    }

    fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        Ok(self.blobs.contains_key(&entry_key(bucket, key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_and_is_empty() {
        let store = MemoryModelStore::new();
        assert!(store.is_empty());

        store.put("b", "k1", b"v".to_vec()).unwrap();
        store.put("b", "k2", b"v".to_vec()).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_empty_value() {
        let store = MemoryModelStore::default();
        store.put("b", "k", vec![]).unwrap();
        assert_eq!(store.get("b", "k").unwrap(), Some(vec![]));
    }
}
