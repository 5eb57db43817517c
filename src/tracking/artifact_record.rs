//! Artifact Record - files persisted by a stage

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StageName;

/// A file written by a stage during the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    stage: StageName,
    key: String,
    path: PathBuf,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Create a new artifact record.
    #[must_use]
    pub fn new(
        stage: StageName,
        key: impl Into<String>,
        path: impl Into<PathBuf>,
        size_bytes: u64,
    ) -> Self {
        Self {
            stage,
            key: key.into(),
            path: path.into(),
            size_bytes,
            created_at: Utc::now(),
        }
    }

    /// Record an existing file, reading its size from disk.
    ///
    /// A file that cannot be stat'ed is recorded with size 0.
    #[must_use]
    pub fn from_file(stage: StageName, key: impl Into<String>, path: impl AsRef<Path>) -> Self {
        let size = fs::metadata(path.as_ref()).map_or(0, |m| m.len());
        Self::new(stage, key, path.as_ref(), size)
    }

    /// Stage that produced the file.
    #[must_use]
    pub const fn stage(&self) -> StageName {
        self.stage
    }

    /// Artifact name (e.g. `train_csv`, `trained_model`).
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Location on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes when recorded.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
