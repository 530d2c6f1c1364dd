//! Key-value persistence for gallery state
//!
//! A `localStorage`-shaped interface: string keys, string values. The
//! directory backend writes one file per key.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Storage errors
#[derive(Debug)]
pub enum StorageError {
    /// Keys are restricted to ASCII letters, digits, `-` and `_`
    InvalidKey(String),
    Io(std::io::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::InvalidKey(key) => write!(f, "Invalid storage key: {:?}", key),
            StorageError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

/// String key-value store
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

fn check_key(key: &str) -> Result<(), StorageError> {
    let ok = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// In-process storage, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        check_key(key)?;
        Ok(self.items.read().unwrap_or_else(|e| e.into_inner()).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        check_key(key)?;
        self.items
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        check_key(key)?;
        self.items.write().unwrap_or_else(|e| e.into_inner()).remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key under a directory
#[derive(Debug, Clone)]
pub struct DirStorage {
    dir: PathBuf,
}

impl DirStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        check_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStorage for DirStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(StorageError::Io)?;
        // Readers never observe a partially written value
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(StorageError::Io)?;
        fs::rename(&tmp, &path).map_err(StorageError::Io)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(storage: &dyn KeyValueStorage) {
        assert_eq!(storage.get_item("border-maker-gallery").unwrap(), None);
        storage.set_item("border-maker-gallery", "[\"a\"]").unwrap();
        assert_eq!(storage.get_item("border-maker-gallery").unwrap().as_deref(), Some("[\"a\"]"));
        storage.set_item("border-maker-gallery", "[]").unwrap();
        assert_eq!(storage.get_item("border-maker-gallery").unwrap().as_deref(), Some("[]"));
        storage.remove_item("border-maker-gallery").unwrap();
        assert_eq!(storage.get_item("border-maker-gallery").unwrap(), None);
        storage.remove_item("border-maker-gallery").unwrap();
    }

    #[test]
    fn test_memory_storage() {
        exercise(&MemoryStorage::new());
    }

    #[test]
    fn test_dir_storage() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DirStorage::new(tmp.path().join("state"));
        exercise(&storage);
    }

    #[test]
    fn test_dir_storage_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        DirStorage::new(tmp.path()).set_item("border-maker-current-image", "\"x\"").unwrap();
        let reopened = DirStorage::new(tmp.path());
        assert_eq!(reopened.get_item("border-maker-current-image").unwrap().as_deref(), Some("\"x\""));
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let storage = MemoryStorage::new();
        assert!(matches!(storage.set_item("../x", "1"), Err(StorageError::InvalidKey(_))));
        assert!(matches!(storage.get_item(""), Err(StorageError::InvalidKey(_))));
    }
}
