//! Durable map backend trait.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::StoreError;

/// Pluggable persistence for a [`DurableMap`](super::DurableMap).
///
/// Backends store opaque string values under string keys. Unlike the
/// lookup-path caches, errors are returned so callers control how a failed
/// flush is handled.
#[async_trait]
pub trait MapBackend: Send + Sync {
    /// Load every stored entry.
    ///
    /// # Returns
    /// All `(key, encoded value)` pairs.
    async fn load_all(&self) -> Result<Vec<(String, String)>, StoreError>;

    /// Apply a batch of upserts and deletes atomically.
    ///
    /// # Arguments
    /// * `puts` - `(key, encoded value)` pairs to insert or replace
    /// * `deletes` - Keys to remove
    async fn apply(&self, puts: &[(String, String)], deletes: &[String]) -> Result<(), StoreError>;

    /// Remove every entry.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// In-memory backend; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryMapBackend {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryMapBackend {
    /// Create an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries persisted so far.
    pub fn persisted_len(&self) -> usize {
        self.data.lock().unwrap().len()
    }
}

#[async_trait]
impl MapBackend for MemoryMapBackend {
    async fn load_all(&self) -> Result<Vec<(String, String)>, StoreError> {
        let data = self.data.lock().unwrap();
        Ok(data.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    async fn apply(&self, puts: &[(String, String)], deletes: &[String]) -> Result<(), StoreError> {
        let mut data = self.data.lock().unwrap();
        for key in deletes {
            data.remove(key);
        }
        for (key, value) in puts {
            data.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.data.lock().unwrap().clear();
        Ok(())
    }
}

#[async_trait]
impl<B: MapBackend + ?Sized> MapBackend for std::sync::Arc<B> {
    async fn load_all(&self) -> Result<Vec<(String, String)>, StoreError> {
        (**self).load_all().await
    }

    async fn apply(&self, puts: &[(String, String)], deletes: &[String]) -> Result<(), StoreError> {
        (**self).apply(puts, deletes).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }
}
