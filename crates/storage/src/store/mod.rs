//! Durable key-value maps backing the engine's local databases.
//!
//! A [`DurableMap`] keeps every entry in memory and writes changes through
//! to memory immediately; persistence happens only when the caller asks
//! for it with [`DurableMap::flush`]. Callers pick the durability point,
//! trading write amplification against how much progress a crash can lose.

mod backend;
mod error;
mod sqlite;

pub use backend::{MapBackend, MemoryMapBackend};
pub use error::StoreError;
pub use sqlite::SqliteMapBackend;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Pending in-memory state of a durable map.
struct MapState<V> {
    entries: HashMap<String, V>,
    dirty: HashSet<String>,
    removed: HashSet<String>,
}

/// In-memory map with explicit flush to a [`MapBackend`].
///
/// Safe to share between concurrently running task units. Writes are
/// upserts by key, so repeated writes for the same key just overwrite.
pub struct DurableMap<V> {
    backend: Box<dyn MapBackend>,
    state: Mutex<MapState<V>>,
    /// Serializes flushes so batches reach the backend in snapshot order.
    flush_lock: tokio::sync::Mutex<()>,
}

impl<V> DurableMap<V>
where
    V: Clone + Serialize + DeserializeOwned + Send,
{
    /// Open a map and load every persisted entry.
    ///
    /// Entries that no longer decode are skipped and removed on the next
    /// flush.
    ///
    /// # Arguments
    /// * `backend` - Persistence backend
    ///
    /// # Errors
    /// Returns error if the backend cannot be read.
    pub async fn open(backend: impl MapBackend + 'static) -> Result<Self, StoreError> {
        let raw: Vec<(String, String)> = backend.load_all().await?;

        let mut entries: HashMap<String, V> = HashMap::with_capacity(raw.len());
        let mut removed: HashSet<String> = HashSet::new();
        for (key, value) in raw {
            match serde_json::from_str::<V>(&value) {
                Ok(decoded) => {
                    entries.insert(key, decoded);
                }
                Err(e) => {
                    log::warn!("Dropping undecodable store entry {}: {}", key, e);
                    removed.insert(key);
                }
            }
        }

        Ok(Self {
            backend: Box::new(backend),
            state: Mutex::new(MapState {
                entries,
                dirty: HashSet::new(),
                removed,
            }),
            flush_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Look up an entry.
    pub fn get(&self, key: &str) -> Option<V> {
        self.state.lock().unwrap().entries.get(key).cloned()
    }

    /// Check whether an entry exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.state.lock().unwrap().entries.contains_key(key)
    }

    /// Insert or replace an entry in memory.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let key: String = key.into();
        let mut state = self.state.lock().unwrap();
        state.removed.remove(&key);
        state.dirty.insert(key.clone());
        state.entries.insert(key, value);
    }

    /// Remove an entry in memory.
    ///
    /// # Returns
    /// `true` if the entry existed.
    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        state.dirty.remove(key);
        let existed: bool = state.entries.remove(key).is_some();
        state.removed.insert(key.to_string());
        existed
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    /// Check whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether there are changes not yet flushed.
    pub fn is_dirty(&self) -> bool {
        let state = self.state.lock().unwrap();
        !state.dirty.is_empty() || !state.removed.is_empty()
    }

    /// Persist all pending changes to the backend.
    ///
    /// On failure the changes stay pending and a later flush retries them.
    ///
    /// # Returns
    /// Number of keys written or deleted.
    ///
    /// # Errors
    /// Returns error if encoding or the backend write fails.
    pub async fn flush(&self) -> Result<usize, StoreError> {
        let _flush_guard = self.flush_lock.lock().await;

        let (puts, deletes) = {
            let mut state = self.state.lock().unwrap();
            let mut puts: Vec<(String, String)> = Vec::with_capacity(state.dirty.len());
            for key in &state.dirty {
                if let Some(value) = state.entries.get(key) {
                    puts.push((key.clone(), serde_json::to_string(value)?));
                }
            }
            let deletes: Vec<String> = state.removed.drain().collect();
            state.dirty.clear();
            (puts, deletes)
        };

        if let Err(e) = self.backend.apply(&puts, &deletes).await {
            let mut state = self.state.lock().unwrap();
            for (key, _) in puts {
                if state.entries.contains_key(&key) {
                    state.dirty.insert(key);
                }
            }
            for key in deletes {
                if !state.entries.contains_key(&key) {
                    state.removed.insert(key);
                }
            }
            return Err(e);
        }

        Ok(puts.len() + deletes.len())
    }

    /// Remove every entry, in memory and in the backend.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _flush_guard = self.flush_lock.lock().await;
        {
            let mut state = self.state.lock().unwrap();
            state.entries.clear();
            state.dirty.clear();
            state.removed.clear();
        }
        self.backend.clear().await
    }
}
