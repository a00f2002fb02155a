//! Local JSON document storage.
//!
//! One JSON document per key, stored as `<data_dir>/storage/<key>.json`.
//! This stands in for the string-keyed local storage the mobile build used
//! and backs the favorites set and the cached session.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: data_dir.into().join("storage"),
        }
    }

    /// Rejects keys that would escape the storage directory.
    fn validate_key(key: &str) -> StorageResult<()> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key.contains("..")
            || key.starts_with('.')
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Loads a document. Returns `Ok(None)` if the key has never been set.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        Self::validate_key(key)?;
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Stores a document, replacing any previous value for the key.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        Self::validate_key(key)?;
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(key);
        let bytes = serde_json::to_vec_pretty(value)?;

        // Write via temp file + rename so readers never see a partial document.
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &bytes)?;
        fs::rename(&temp_path, &path)?;

        Ok(())
    }

    /// Removes a document. Removing a missing key is a no-op.
    pub fn remove(&self, key: &str) -> StorageResult<()> {
        Self::validate_key(key)?;
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
