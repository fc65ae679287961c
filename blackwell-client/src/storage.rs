use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{ClientError, Result};

/// String key/value storage scoped to one page session (a browser tab).
///
/// Reads and writes are synchronous.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// In-memory implementation of SessionStore
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    entries: Arc<DashMap<String, String>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// JSON-file backed SessionStore. Every write rewrites the whole file so a
/// later process picks up where the previous one stopped.
pub struct FileSessionStore {
    path: PathBuf,
    entries: DashMap<String, String>,
}

impl FileSessionStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = DashMap::new();

        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if !raw.trim().is_empty() {
                let stored: BTreeMap<String, String> = serde_json::from_str(&raw)?;
                for (key, value) in stored {
                    entries.insert(key, value);
                }
            }
            debug!("Loaded {} session entries from {}", entries.len(), path.display());
        }

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        let snapshot: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.path, json).map_err(|e| {
            ClientError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.clear();
        self.persist()
    }
}
