//! services/board/src/adapters/local_storage.rs
//!
//! Persistent key/value storage for one profile, kept as a small JSON object
//! on disk. This is where the session identifier lives between runs.

use secretboard_core::ports::{PortError, PortResult, SessionStorage};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

pub struct FileStorage {
    path: PathBuf,
    // Serialises read-modify-write cycles within the process.
    guard: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    fn load(&self) -> PortResult<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                PortError::Storage(format!("{} is not valid JSON: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(PortError::Storage(e.to_string())),
        }
    }

    fn save(&self, items: &BTreeMap<String, String>) -> PortResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PortError::Storage(e.to_string()))?;
        }
        let json =
            serde_json::to_string_pretty(items).map_err(|e| PortError::Storage(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| PortError::Storage(e.to_string()))
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> PortResult<Option<String>> {
        let _lock = self.guard.lock().map_err(|_| lock_poisoned())?;
        Ok(self.load()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> PortResult<()> {
        let _lock = self.guard.lock().map_err(|_| lock_poisoned())?;
        let mut items = self.load()?;
        items.insert(key.to_string(), value.to_string());
        self.save(&items)
    }
}

fn lock_poisoned() -> PortError {
    PortError::Storage("local storage lock poisoned".to_string())
}
