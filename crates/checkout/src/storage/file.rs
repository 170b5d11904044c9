//! JSON-file-backed store.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{KeyValueStore, StorageError};

/// A durable store persisted as a single JSON document on disk.
///
/// The whole document is rewritten on every mutation via write-to-temp plus
/// rename, so a crash mid-write leaves the previous document intact. Writes
/// from two processes are last-write-wins; this mirrors the single-logical-
/// writer model of the cart (see `cart` module docs).
pub struct FileStore {
    path: PathBuf,
    state: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl FileStore {
    /// Open a store at `path`, loading the existing document if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let state = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Persist the current document atomically (write temp file, then rename).
    fn flush(
        &self,
        state: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), StorageError> {
        let serialized = serde_json::to_string_pretty(state)?;
        let tmp_path = tmp_sibling(&self.path);

        {
            let mut tmp = fs::File::create(&tmp_path)?;
            tmp.write_all(serialized.as_bytes())?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, serde_json::Value>> {
        // A poisoned lock means a writer panicked between map update and
        // flush; the in-memory map is still a coherent document.
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| "state".into(), std::ffi::OsStr::to_os_string);
    name.push(".tmp");
    path.with_file_name(name)
}

impl KeyValueStore for FileStore {
    fn get_raw(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        let mut state = self.lock();
        state.insert(key.to_string(), value);
        self.flush(&state)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut state = self.lock();
        if state.remove(key).is_some() {
            self.flush(&state)?;
        }
        Ok(())
    }
}
