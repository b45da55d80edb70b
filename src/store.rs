//! Persisted key-value settings.
//!
//! A tiny typed map on top of a TOML table. Missing or malformed values read
//! back as the type's default, so callers never have to handle a corrupt
//! settings file specially.

use crate::config::{ConfigError, ConfigResult};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Raw access to the stored values.
pub trait SettingsStore: Send + Sync {
    fn get_value(&self, key: &str) -> Option<toml::Value>;
    fn set_value(&self, key: &str, value: toml::Value) -> ConfigResult<()>;
}

/// Typed helpers for every [`SettingsStore`].
pub trait SettingsStoreExt: SettingsStore {
    /// Stored value for `key`, or `T::default()` when absent or unreadable.
    fn get<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.get_value(key) {
            Some(value) => value.try_into().unwrap_or_else(|e| {
                warn!(key, error = %e, "ignoring malformed stored setting");
                T::default()
            }),
            None => T::default(),
        }
    }

    fn set<T: Serialize>(&self, key: &str, value: &T) -> ConfigResult<()> {
        let value = toml::Value::try_from(value)?;
        self.set_value(key, value)
    }
}

impl<S: SettingsStore + ?Sized> SettingsStoreExt for S {}

/// Settings kept in memory only.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    table: Mutex<toml::Table>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_value(&self, key: &str) -> Option<toml::Value> {
        self.table.lock().get(key).cloned()
    }

    fn set_value(&self, key: &str, value: toml::Value) -> ConfigResult<()> {
        self.table.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// Settings persisted to a TOML file, rewritten on every `set`.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    table: Mutex<toml::Table>,
}

impl FileSettingsStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable one is logged and treated as empty.
    pub fn open(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let table = match std::fs::read_to_string(&path) {
            Ok(content) => content.parse::<toml::Table>().unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "settings file is corrupt, starting empty");
                toml::Table::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
            Err(e) => return Err(ConfigError::read(&path, e)),
        };
        debug!(path = %path.display(), keys = table.len(), "opened settings store");
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    /// Open `settings.toml` in the platform config directory.
    pub fn open_default() -> ConfigResult<Self> {
        let dir = crate::config::get_default_config_dir()
            .ok_or(ConfigError::NoLocation("settings store"))?;
        Self::open(dir.join(SETTINGS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, table: &toml::Table) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::write(&self.path, e))?;
        }
        let content = toml::to_string_pretty(table)?;
        std::fs::write(&self.path, content).map_err(|e| ConfigError::write(&self.path, e))
    }
}

impl SettingsStore for FileSettingsStore {
    fn get_value(&self, key: &str) -> Option<toml::Value> {
        self.table.lock().get(key).cloned()
    }

    fn set_value(&self, key: &str, value: toml::Value) -> ConfigResult<()> {
        let mut table = self.table.lock();
        table.insert(key.to_string(), value);
        self.persist(&table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_defaults() {
        let store = MemorySettingsStore::new();
        let uuids: Vec<String> = store.get("bluetooth_uuids");
        assert!(uuids.is_empty());

        store.set("bluetooth_uuids", &vec!["a".to_string()]).unwrap();
        let uuids: Vec<String> = store.get("bluetooth_uuids");
        assert_eq!(uuids, vec!["a".to_string()]);
    }

    #[test]
    fn test_malformed_value_reads_as_default() {
        let store = MemorySettingsStore::new();
        store.set("count", &"not a number").unwrap();
        let count: u32 = store.get("count");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let store = FileSettingsStore::open(&path).unwrap();
        store.set("bluetooth_uuids", &vec!["x", "y"]).unwrap();
        drop(store);

        let reopened = FileSettingsStore::open(&path).unwrap();
        let uuids: Vec<String> = reopened.get("bluetooth_uuids");
        assert_eq!(uuids, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let store = FileSettingsStore::open(&path).unwrap();
        let uuids: Vec<String> = store.get("bluetooth_uuids");
        assert!(uuids.is_empty());
    }
}
