//! Filesystem model store: `<root>/<bucket>/<key>`

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use super::ModelStore;
use crate::{Error, Result};

/// Directory-backed blob store; each bucket is a subdirectory of `root`.
#[derive(Debug, Clone)]
pub struct FsModelStore {
    root: PathBuf,
}

impl FsModelStore {
    /// Create a store rooted at `root` (created lazily on first write)
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        for part in [bucket, key] {
            let path = Path::new(part);
            if part.is_empty()
                || path
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_)))
            {
                return Err(Error::Store(format!("invalid bucket or key: {part:?}")));
            }
        }
        Ok(self.root.join(bucket).join(key))
    }
}

impl ModelStore for FsModelStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.blob_path(bucket, key)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, bucket: &str, key: &str, value: Vec<u8>) -> Result<()> {
        let path = self.blob_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write then rename so readers never observe a half-written model
        let tmp = path.with_extension("partial");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        match fs::remove_file(self.blob_path(bucket, key)?) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        Ok(self.blob_path(bucket, key)?.is_file())
    }
}
