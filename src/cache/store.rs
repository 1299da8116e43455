//! Key-value store abstraction holding one field map per entry.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

/// Flat field-name to value mapping stored under one entry key.
pub type FieldMap = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[from] redb::Error),
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Hash-style store shared by every concurrent check.
///
/// Implementations synchronize internally. Both operations are atomic for
/// a single entry: a read never observes half of a write.
#[async_trait]
pub trait CheckStore: Send + Sync {
    /// All fields stored under `key`; empty when the entry does not exist.
    async fn read_entry(&self, key: &str) -> Result<FieldMap, StoreError>;

    /// Replace the entry under `key` with exactly `fields`.
    async fn write_entry(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError>;
}

/// In-process store backed by a locked map.
#[derive(Clone, Debug, Default)]
pub struct MemoryCheckStore {
    inner: Arc<RwLock<HashMap<String, FieldMap>>>,
}

impl MemoryCheckStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.inner.write() {
            guard.clear();
        }
    }
}

#[async_trait]
impl CheckStore for MemoryCheckStore {
    async fn read_entry(&self, key: &str) -> Result<FieldMap, StoreError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        Ok(guard.get(key).cloned().unwrap_or_default())
    }

    async fn write_entry(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        guard.insert(key.to_string(), fields.clone());
        Ok(())
    }
}
