//! String-keyed persistence used for stopwatch snapshots.
//!
//! Writes are synchronous: once `set` or `delete` returns `Ok`, the change
//! survives a process exit.

use crate::{Error, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;
}

/// One file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(Error::Validation(format!("Invalid store key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp_path = path.with_extension("json.tmp");

        // Write aside and rename so readers never observe a torn snapshot.
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &path)?;

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store for tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, simulating an unavailable store.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "store unavailable",
            )));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_set_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("state")).unwrap();

        assert_eq!(store.get("stopwatch_state").unwrap(), None);

        store.set("stopwatch_state", r#"{"running":true}"#).unwrap();
        assert_eq!(
            store.get("stopwatch_state").unwrap().as_deref(),
            Some(r#"{"running":true}"#)
        );

        store.delete("stopwatch_state").unwrap();
        assert_eq!(store.get("stopwatch_state").unwrap(), None);

        // second delete is a no-op
        store.delete("stopwatch_state").unwrap();
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::new(dir.path().to_path_buf()).unwrap();
            store.set("k", "v1").unwrap();
            store.set("k", "v2").unwrap();
        }

        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        assert!(!dir.path().join("k.json.tmp").exists());
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        assert!(store.set("../escape", "x").is_err());
        assert!(store.set("", "x").is_err());
        assert!(store.get("a/b").is_err());
    }

    #[test]
    fn test_memory_store_failing_mode() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();

        store.set_failing(true);
        assert!(store.set("a", "2").is_err());
        assert!(store.delete("a").is_err());
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        store.set_failing(false);
        store.delete("a").unwrap();
        assert!(!store.contains("a"));
    }
}
