//! Core MarkerStore implementations

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;

/// File holding all markers of a store directory
pub const MARKERS_FILE: &str = "markers.json";

/// Advisory lock file taken around every access
pub const LOCK_FILE: &str = "markers.lock";

/// A stored marker value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    /// Marker payload
    pub value: String,
    /// When the marker was last set
    pub set_at: DateTime<Utc>,
}

impl Marker {
    fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            set_at: Utc::now(),
        }
    }
}

/// Durable string key/value store for recovery markers
///
/// Implementations must be safe to share between tasks; every call is
/// short and synchronous.
pub trait MarkerStore: Send + Sync {
    /// Read a marker value
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set (or overwrite) a marker
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a marker, returning true if it existed
    fn clear(&self, key: &str) -> Result<bool, StoreError>;

    /// All keys currently set, sorted
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.trim().is_empty() {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// In-process marker store
///
/// Forgets everything when dropped. Used for tests and simulations.
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    markers: Mutex<HashMap<String, Marker>>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Marker>> {
        // A panic while holding the map cannot leave it half-written
        self.markers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Full marker (value and timestamp) for a key
    pub fn marker(&self, key: &str) -> Option<Marker> {
        self.lock().get(key).cloned()
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(key)?;
        Ok(self.lock().get(key).map(|m| m.value.clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        debug!(%key, "MemoryMarkerStore::set");
        self.lock().insert(key.to_string(), Marker::new(value));
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        debug!(%key, "MemoryMarkerStore::clear");
        Ok(self.lock().remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<_> = self.lock().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Marker store persisted as a JSON document on disk
///
/// Writes go to a temp file that is renamed over the document, so a crash
/// mid-write leaves the previous contents intact.
#[derive(Debug, Clone)]
pub struct FileMarkerStore {
    base_path: PathBuf,
}

impl FileMarkerStore {
    /// Open or create a marker store in the given directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        debug!(?base_path, "Opened marker store");
        Ok(Self { base_path })
    }

    /// Directory backing this store
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    fn markers_path(&self) -> PathBuf {
        self.base_path.join(MARKERS_FILE)
    }

    /// Run `f` while holding the store lock
    fn with_lock<R>(&self, exclusive: bool, f: impl FnOnce() -> Result<R, StoreError>) -> Result<R, StoreError> {
        let lock_path = self.base_path.join(LOCK_FILE);
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        let locked = if exclusive {
            FileExt::lock_exclusive(&lock_file)
        } else {
            FileExt::lock_shared(&lock_file)
        };
        locked.map_err(|source| StoreError::Lock {
            path: lock_path.clone(),
            source,
        })?;

        let result = f();
        // Closing the file releases the lock too; unlock errors are not interesting
        let _ = FileExt::unlock(&lock_file);
        result
    }

    fn read_all(&self) -> Result<BTreeMap<String, Marker>, StoreError> {
        let path = self.markers_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_all(&self, markers: &BTreeMap<String, Marker>) -> Result<(), StoreError> {
        let path = self.markers_path();
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_vec_pretty(markers)?)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// All markers with their timestamps
    pub fn entries(&self) -> Result<BTreeMap<String, Marker>, StoreError> {
        self.with_lock(false, || self.read_all())
    }
}

impl MarkerStore for FileMarkerStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(key)?;
        let markers = self.with_lock(false, || self.read_all())?;
        Ok(markers.get(key).map(|m| m.value.clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.with_lock(true, || {
            let mut markers = self.read_all()?;
            markers.insert(key.to_string(), Marker::new(value));
            self.write_all(&markers)
        })?;
        info!(%key, "Marker set");
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        let removed = self.with_lock(true, || {
            let mut markers = self.read_all()?;
            if markers.remove(key).is_none() {
                return Ok(false);
            }
            self.write_all(&markers)?;
            Ok(true)
        })?;
        debug!(%key, removed, "FileMarkerStore::clear");
        Ok(removed)
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries()?.into_keys().collect())
    }
}
