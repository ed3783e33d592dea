//! JSON-file storage for native hosts.
//!
//! DESIGN
//! ======
//! The whole key/value map is one JSON object on disk. Every operation
//! re-reads the file so concurrent processes converge on last-write-wins,
//! and writes go through a temp file + rename so a crash never leaves a
//! half-written map behind.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::StorageError;
use crate::ports::StoragePort;

#[cfg(test)]
#[path = "file_test.rs"]
mod tests;

/// [`StoragePort`] persisted to a single JSON file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(io_error(&e)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| StorageError::Io(format!("corrupt storage file: {e}")))
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let raw = serde_json::to_string_pretty(map).map_err(|e| StorageError::Io(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_error(&e))?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, raw).map_err(|e| io_error(&e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_error(&e))
    }

    fn update<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map()?;
        f(&mut map);
        self.write_map(&map)
    }
}

fn io_error(e: &std::io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::PermissionDenied => StorageError::Denied(e.to_string()),
        ErrorKind::StorageFull => StorageError::QuotaExceeded,
        _ => StorageError::Io(e.to_string()),
    }
}

impl StoragePort for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|map| {
            map.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|map| {
            map.remove(key);
        })
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.read_map()?.into_keys().collect())
    }
}
