//! Persisted key-value storage, the terminal counterpart of browser local
//! storage, plus the on-disk locations the client uses.

use directories::ProjectDirs;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("could not locate a data directory")]
    NoDataDir,
    #[error("writing {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("serializing storage: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<bool, StorageError>;
}

/// A JSON object kept in a single file. Every mutation rewrites the whole
/// file. Only string values are readable through the store; entries of any
/// other type are carried over untouched on rewrite.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(data) => parse_entries(&data).unwrap_or_else(|| {
                warn!(path = %path.display(), "storage file is not a JSON object, starting empty");
                BTreeMap::new()
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not read storage file");
                BTreeMap::new()
            }
        };
        FileStore { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let serialized = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, serialized).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

fn parse_entries(data: &str) -> Option<BTreeMap<String, Value>> {
    match serde_json::from_str::<Value>(data).ok()? {
        Value::Object(object) => Some(object.into_iter().collect()),
        _ => None,
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.entries.get(key)? {
            Value::String(s) => Some(s.clone()),
            other => {
                warn!(key, kind = json_kind(other), "stored value is not a string, ignoring it");
                None
            }
        }
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), Value::String(value));
        self.save()
    }

    fn remove(&mut self, key: &str) -> Result<bool, StorageError> {
        let existed = self.entries.remove(key).is_some();
        if existed {
            self.save()?;
        }
        Ok(existed)
    }
}

/// In-process store, handy for tests and for running without a data dir.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    pub writes: usize,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        self.writes += 1;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.remove(key).is_some())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn data_dir() -> Result<PathBuf, StorageError> {
    let dirs = ProjectDirs::from("", "", "taskdesk").ok_or(StorageError::NoDataDir)?;
    Ok(dirs.data_dir().to_path_buf())
}

pub fn config_dir() -> Result<PathBuf, StorageError> {
    let dirs = ProjectDirs::from("", "", "taskdesk").ok_or(StorageError::NoDataDir)?;
    Ok(dirs.config_dir().to_path_buf())
}

pub fn storage_path(data_dir: &Path) -> PathBuf {
    data_dir.join("storage.json")
}

pub fn log_path(data_dir: &Path) -> PathBuf {
    data_dir.join("taskdesk.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = storage_path(dir.path());
        let mut store = FileStore::open(&path);
        store.set("todoAutoSave", "{}".into()).unwrap();
        store.set("theme", "night".into()).unwrap();

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("theme").as_deref(), Some("night"));
        assert_eq!(reopened.get("todoAutoSave").as_deref(), Some("{}"));
    }

    #[test]
    fn garbage_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = storage_path(dir.path());
        fs::write(&path, "[1, 2, oops").unwrap();
        let store = FileStore::open(&path);
        assert_eq!(store.get("todoAutoSave"), None);
    }

    #[test]
    fn foreign_values_survive_a_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = storage_path(dir.path());
        fs::write(&path, r#"{"sidebar": {"open": true}, "visits": 3, "theme": "night"}"#).unwrap();

        let mut store = FileStore::open(&path);
        assert_eq!(store.get("visits"), None);
        assert_eq!(store.get("theme").as_deref(), Some("night"));
        store.set("todoAutoSave", "{}".into()).unwrap();

        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["visits"], 3);
        assert_eq!(on_disk["sidebar"]["open"], true);
        assert_eq!(on_disk["todoAutoSave"], "{}");
    }

    #[test]
    fn remove_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("nested/storage.json"));
        assert!(!store.remove("missing").unwrap());
        store.set("k", "v".into()).unwrap();
        assert!(store.remove("k").unwrap());
        assert_eq!(FileStore::open(store.path()).get("k"), None);
    }
}
