//! Persistent key-value store: the durable substrate for credentials, the
//! cached profile and cached bookmark flags.
//!
//! Synchronous by contract: every read is served from memory, every write goes
//! through to disk (tmp file + rename) before returning. Several client
//! instances may share one file; a write only touches its own key on disk so
//! concurrent instances do not clobber each other, and `reload` reports what
//! other instances changed since the last look.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::StoreError;

/// Key holding the bearer access token.
pub const ACCESS_KEY: &str = "access";
/// Key holding the refresh token.
pub const REFRESH_KEY: &str = "refresh";
/// Key holding the cached profile blob (JSON).
pub const PROFILE_KEY: &str = "profile";
/// Prefix for cached per-article bookmark flags: `bookmark:<url>`.
pub const BOOKMARK_PREFIX: &str = "bookmark:";

/// One key whose value differs between memory and disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

pub struct KvStore {
    path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, String>>,
}

impl KvStore {
    /// Open (or lazily create) a file-backed store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = read_entries(&path)?;
        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened key-value store");
        Ok(Self {
            path: Some(path),
            entries: RwLock::new(entries),
        })
    }

    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.write();
        self.persist(key, Some(value))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Remove a key, returning its previous value.
    pub fn remove(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.write();
        if !entries.contains_key(key) {
            return Ok(None);
        }
        self.persist(key, None)?;
        Ok(entries.remove(key))
    }

    pub fn entries_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        self.read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Re-read the backing file and adopt it, returning every key that changed
    /// underneath us. Always empty for in-memory stores.
    pub fn reload(&self) -> Result<Vec<StorageChange>, StoreError> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };

        let on_disk = read_entries(path)?;
        let mut entries = self.write();
        let changes = diff(&entries, &on_disk);
        *entries = on_disk;
        Ok(changes)
    }

    fn persist(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut on_disk = read_entries(path)?;
        match value {
            Some(v) => on_disk.insert(key.to_string(), v.to_string()),
            None => on_disk.remove(key),
        };
        write_entries(path, &on_disk)
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&content)?)
}

fn write_entries(path: &Path, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(entries)?;
    let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    let mut tmp_file = File::create(&tmp_path)?;
    tmp_file.write_all(json.as_bytes())?;
    tmp_file.sync_all()?;
    drop(tmp_file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn diff(before: &BTreeMap<String, String>, after: &BTreeMap<String, String>) -> Vec<StorageChange> {
    let mut changes = Vec::new();

    for (key, old) in before {
        match after.get(key) {
            Some(new) if new == old => {}
            new => changes.push(StorageChange {
                key: key.clone(),
                old_value: Some(old.clone()),
                new_value: new.cloned(),
            }),
        }
    }

    for (key, new) in after {
        if !before.contains_key(key) {
            changes.push(StorageChange {
                key: key.clone(),
                old_value: None,
                new_value: Some(new.clone()),
            });
        }
    }

    changes
}
