//! String key-value storage for state that outlives the process.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::atomic_write::write_atomic_text;

pub const STATE_FILENAME: &str = "state.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode stored value: {0}")]
    Json(#[from] serde_json::Error),
}

/// A flat map of string keys to string values.
///
/// Structured values are stored as JSON text. An empty value reads the same as
/// a missing one.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    /// Write all `values` in one batch.
    fn set(&mut self, values: &[(&str, &str)]) -> Result<(), StoreError>;
}

/// Non-persistent store used by tests and `--no-persist` runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).filter(|v| !v.is_empty()).cloned()
    }

    fn set(&mut self, values: &[(&str, &str)]) -> Result<(), StoreError> {
        for (key, value) in values {
            self.values.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store at `<dir>/state.json`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::open(dir.join(STATE_FILENAME))
    }

    /// Load `path` if it exists. A missing or unreadable file starts empty; the
    /// next write replaces it.
    pub fn open(path: PathBuf) -> Self {
        let values = load_values(&path);
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).filter(|v| !v.is_empty()).cloned()
    }

    fn set(&mut self, values: &[(&str, &str)]) -> Result<(), StoreError> {
        for (key, value) in values {
            self.values.insert((*key).to_string(), (*value).to_string());
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        write_atomic_text(&self.path, &json).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn load_values(path: &Path) -> BTreeMap<String, String> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(err) => {
            tracing::warn!("failed to read state from {}: {err}", path.display());
            return BTreeMap::new();
        }
    };

    match serde_json::from_str(&contents) {
        Ok(values) => values,
        Err(err) => {
            tracing::warn!("ignoring corrupt state file {}: {err}", path.display());
            BTreeMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = JsonFileStore::in_dir(dir.path());
        store
            .set(&[("version", "1.0.0"), ("top_usages", "[]")])
            .expect("set");

        let reopened = JsonFileStore::in_dir(dir.path());
        assert_eq!(reopened.get("version"), Some("1.0.0".to_string()));
        assert_eq!(reopened.get("top_usages"), Some("[]".to_string()));
        assert_eq!(reopened.get("missing"), None);
    }

    #[test]
    fn empty_values_read_as_missing() {
        let mut store = MemoryStore::new();
        store.set(&[("suggestions", "")]).expect("set");
        assert_eq!(store.get("suggestions"), None);
    }

    #[test]
    fn corrupt_file_starts_empty_and_is_replaced_on_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(STATE_FILENAME);
        std::fs::write(&path, "not json").expect("write corrupt");

        let mut store = JsonFileStore::open(path.clone());
        assert_eq!(store.get("version"), None);

        store.set(&[("version", "1.0.0")]).expect("set");
        let contents = std::fs::read_to_string(&path).expect("read");
        assert!(contents.contains("\"version\": \"1.0.0\""));
    }
}
