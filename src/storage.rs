use log::{error, info, warn};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Keys under which the admin state is persisted.
pub struct StorageKeys;

impl StorageKeys {
    pub const NEWS: &'static str = "bda_news";
    pub const MEDIA: &'static str = "bda_media";
    pub const AUTH: &'static str = "bda_auth";
    /// News list wrapped with a timestamp for manual export; never loaded back.
    pub const NEWS_EXPORT: &'static str = "newsData";
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("quota exceeded: {needed} bytes needed, quota is {quota}")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("store lock poisoned")]
    Poisoned,
}

/// Raw string key-value store with local-storage semantics.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

type Items = BTreeMap<String, String>;

fn used_bytes(items: &Items) -> usize {
    items.iter().map(|(k, v)| k.len() + v.len()).sum()
}

/// Rejects a write that would push the store past its quota. The current
/// value of `key` is replaced, so its size is not counted twice.
fn check_quota(items: &Items, quota: Option<usize>, key: &str, value: &str) -> Result<(), StorageError> {
    let Some(quota) = quota else { return Ok(()) };
    let replaced = items.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
    let needed = used_bytes(items) - replaced + key.len() + value.len();
    if needed > quota {
        return Err(StorageError::QuotaExceeded { needed, quota });
    }
    Ok(())
}

// ---------------- In-memory store (tests, throwaway deployments) ----------------
#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<Items>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self { items: RwLock::default(), quota: Some(quota) }
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.read().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| StorageError::Poisoned)?;
        check_quota(&items, self.quota, key, value)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| StorageError::Poisoned)?;
        items.remove(key);
        Ok(())
    }
}

// ---------------- File-backed store (single JSON snapshot) ----------------
pub struct FileStore {
    items: RwLock<Items>,
    path: PathBuf,
    quota: Option<usize>,
}

impl FileStore {
    pub const FILE_NAME: &'static str = "storage.json";

    /// Opens `<data_dir>/storage.json`. A missing or unreadable snapshot
    /// starts the store empty.
    pub fn open(data_dir: impl AsRef<Path>, quota: Option<usize>) -> Self {
        let path = data_dir.as_ref().join(Self::FILE_NAME);
        let items = Self::read_snapshot(&path);
        Self { items: RwLock::new(items), path, quota }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_snapshot(path: &Path) -> Items {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<Items>(&bytes) {
                Ok(items) => {
                    info!("loaded storage snapshot '{}' ({} keys)", path.display(), items.len());
                    items
                }
                Err(e) => {
                    warn!("failed to parse storage snapshot '{}': {e}; starting empty", path.display());
                    Items::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no storage snapshot at '{}'; starting empty", path.display());
                Items::new()
            }
            Err(e) => {
                warn!("failed to read storage snapshot '{}': {e}; starting empty", path.display());
                Items::new()
            }
        }
    }

    fn write_snapshot(&self, items: &Items) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(items)?;
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        // readers only ever see a complete snapshot
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.read().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| StorageError::Poisoned)?;
        check_quota(&items, self.quota, key, value)?;
        let previous = items.insert(key.to_string(), value.to_string());
        if let Err(e) = self.write_snapshot(&items) {
            // memory must not get ahead of disk
            match previous {
                Some(v) => items.insert(key.to_string(), v),
                None => items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| StorageError::Poisoned)?;
        if items.remove(key).is_none() {
            return Ok(());
        }
        self.write_snapshot(&items)
    }
}

/// Typed JSON facade over a [`KeyValueStore`].
///
/// Nothing here returns an error: failures are logged and reported as
/// `false` (writes) or `None` (reads) so callers can keep running when the
/// store is full, unwritable or holds garbage.
#[derive(Clone)]
pub struct StorageManager {
    store: Arc<dyn KeyValueStore>,
}

impl StorageManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let text = match serde_json::to_string(value) {
            Ok(t) => t,
            Err(e) => {
                error!("failed to serialize '{key}': {e}");
                return false;
            }
        };
        match self.store.set_item(key, &text) {
            Ok(()) => true,
            Err(e) => {
                error!("failed to save '{key}': {e}");
                false
            }
        }
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = match self.store.get_item(key) {
            Ok(Some(t)) => t,
            Ok(None) => return None,
            Err(e) => {
                error!("failed to load '{key}': {e}");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(v) => Some(v),
            Err(e) => {
                error!("corrupt value under '{key}': {e}");
                None
            }
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        match self.store.remove_item(key) {
            Ok(()) => true,
            Err(e) => {
                error!("failed to remove '{key}': {e}");
                false
            }
        }
    }
}
