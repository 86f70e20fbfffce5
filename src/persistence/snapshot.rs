//! Snapshot file: save/load the full feature cache to/from one blob on disk.

use crate::error::Result;
use crate::persistence::serialization::{self, CacheSnapshot};
use std::fs;
use std::path::{Path, PathBuf};

/// Appended to the blob's file name to form the manifest path.
const MANIFEST_SUFFIX: &str = ".manifest.json";

/// A cache blob on disk plus its JSON manifest (`<file>.manifest.json`).
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(MANIFEST_SUFFIX);
        PathBuf::from(name)
    }

    /// Write the snapshot blob (bincode) and its manifest (JSON).
    pub fn save(&self, snapshot: &CacheSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let data = serialization::to_bincode(snapshot)?;
        fs::write(&self.path, &data)?;

        let manifest = serialization::to_json(&snapshot.manifest())?;
        fs::write(self.manifest_path(), &manifest)?;

        Ok(())
    }

    /// Load the snapshot, or return None if no blob exists.
    pub fn load(&self) -> Result<Option<CacheSnapshot>> {
        if !self.exists() {
            return Ok(None);
        }

        let data = fs::read(&self.path)?;
        let snapshot: CacheSnapshot = serialization::from_bincode(&data)?;
        Ok(Some(snapshot))
    }

    /// Check if a blob exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
