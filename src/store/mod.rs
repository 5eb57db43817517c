//! Durable model store (bucket/key addressed blobs)
//!
//! Holds exactly one "production" model per bucket under a well-known key.
//! Two backends:
//! - [`MemoryModelStore`]: `DashMap`-backed, lost on process restart
//! - [`FsModelStore`]: one directory per bucket under a root directory
//!
//! # Example
//!
//! ```rust
//! use shipment_cost::store::{MemoryModelStore, ModelStore};
//!
//! let store = MemoryModelStore::new();
//! store.put("models", "model.json", b"{}".to_vec())?;
//! assert!(store.exists("models", "model.json")?);
//! assert_eq!(store.get("models", "model.json")?, Some(b"{}".to_vec()));
//! # Ok::<(), shipment_cost::Error>(())
//! ```

mod fs;
mod memory;

pub use fs::FsModelStore;
pub use memory::MemoryModelStore;

use std::path::Path;

use tracing::{debug, info};

use crate::model::CostModel;
use crate::Result;

/// Blob store contract used by the evaluation and promotion stages.
pub trait ModelStore {
    /// Get a blob by bucket and key.
    ///
    /// Returns `None` if the key doesn't exist.
    ///
    /// # Errors
    /// Returns error if the backend cannot be read
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a blob, overwriting any existing value.
    ///
    /// # Errors
    /// Returns error if the backend cannot be written
    fn put(&self, bucket: &str, key: &str, value: Vec<u8>) -> Result<()>;

    /// Delete a blob. No-op if the key doesn't exist.
    ///
    /// # Errors
    /// Returns error if the backend cannot be written
    fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// Check if a blob exists.
    ///
    /// # Errors
    /// Returns error if the backend cannot be read
    fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        Ok(self.get(bucket, key)?.is_some())
    }

    /// Upload a local file under `bucket/key`.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or the blob cannot be written
    fn upload_file(&self, path: &Path, bucket: &str, key: &str) -> Result<()> {
        let bytes = std::fs::read(path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "uploading file");
        self.put(bucket, key, bytes)?;
        info!(bucket, key, "uploaded file to model store");
        Ok(())
    }
}

/// Load and deserialize the model stored under `bucket/key`, if any
///
/// # Errors
/// Returns error if the store cannot be read or the blob is not a model
pub fn load_model<S: ModelStore + ?Sized>(
    store: &S,
    bucket: &str,
    key: &str,
) -> Result<Option<CostModel>> {
    if !store.exists(bucket, key)? {
        debug!(bucket, key, "no model present in store");
        return Ok(None);
    }
    match store.get(bucket, key)? {
        Some(bytes) => Ok(Some(CostModel::from_bytes(&bytes)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise_store<S: ModelStore>(store: &S) {
        assert!(!store.exists("bucket", "key").unwrap());
        assert_eq!(store.get("bucket", "key").unwrap(), None);

        store.put("bucket", "key", b"value1".to_vec()).unwrap();
        store.put("bucket", "key", b"value2".to_vec()).unwrap();
        assert_eq!(store.get("bucket", "key").unwrap(), Some(b"value2".to_vec()));

        // Buckets are separate namespaces
        assert_eq!(store.get("other", "key").unwrap(), None);

        store.delete("bucket", "key").unwrap();
        assert!(!store.exists("bucket", "key").unwrap());

        // Should not error
        store.delete("bucket", "nonexistent").unwrap();
    }

    #[test]
    fn test_memory_store_contract() {
        exercise_store(&MemoryModelStore::new());
    }

    #[test]
    fn test_fs_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        exercise_store(&FsModelStore::new(dir.path()));
    }

    #[test]
    fn test_upload_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("model.json");
        std::fs::write(&file, b"payload").unwrap();

        let store = MemoryModelStore::new();
        store.upload_file(&file, "bucket", "model.json").unwrap();
        assert_eq!(
            store.get("bucket", "model.json").unwrap(),
            Some(b"payload".to_vec())
        );
    }

    #[test]
    fn test_load_model_absent_is_none() {
        let store = MemoryModelStore::new();
        assert!(load_model(&store, "bucket", "model.json").unwrap().is_none());
    }

    #[test]
    fn test_load_model_rejects_garbage() {
        let store = MemoryModelStore::new();
        store.put("bucket", "model.json", b"not json".to_vec()).unwrap();
        assert!(load_model(&store, "bucket", "model.json").is_err());
    }
}
