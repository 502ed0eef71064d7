//! In-memory table backend.
//!
//! Stores tables in a process-wide registry keyed by the URL's namespace
//! string, so every client opening `memory://ns` sees the same data. Batches
//! are applied under a single lock, so saves and loads are atomic here.

use crate::backend::{BackendKind, Entry, TableBackend};
use crate::core::{now, Error, Result, Timestamp};
use crate::tensor::Tensor;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use tracing::debug;

/// A stored tensor with its write metadata.
#[derive(Clone, Debug)]
struct StoredTensor {
    tensor: Tensor,
    saved_at: Timestamp,
    /// Bumped on every overwrite of this key.
    version: u64,
}

/// Table storage shared by every backend handle on the same namespace.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, HashMap<String, StoredTensor>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a save batch. Last write wins per key.
    pub fn save(&self, table: &str, entries: Vec<Entry>) -> Result<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| Error::Internal(format!("store lock poisoned: {}", e)))?;
        let slot = tables.entry(table.to_string()).or_default();
        for entry in entries {
            let version = slot.get(&entry.key).map_or(1, |prev| prev.version + 1);
            slot.insert(
                entry.key,
                StoredTensor {
                    tensor: entry.tensor,
                    saved_at: now(),
                    version,
                },
            );
        }
        Ok(())
    }

    /// Fetch values for a load batch, all-or-nothing.
    pub fn load(&self, table: &str, keys: &[String]) -> Result<Vec<Tensor>> {
        let tables = self
            .tables
            .read()
            .map_err(|e| Error::Internal(format!("store lock poisoned: {}", e)))?;
        let slot = tables.get(table);
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let stored = slot.and_then(|s| s.get(key)).ok_or_else(|| {
                Error::KeyNotFound {
                    table: table.to_string(),
                    key: key.clone(),
                }
            })?;
            out.push(stored.tensor.clone());
        }
        Ok(out)
    }

    /// Number of keys currently stored under a table.
    pub fn key_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .map(|t| t.get(table).map_or(0, HashMap::len))
            .unwrap_or(0)
    }

    /// When the given key was last written, if ever.
    pub fn saved_at(&self, table: &str, key: &str) -> Option<Timestamp> {
        self.tables
            .read()
            .ok()?
            .get(table)?
            .get(key)
            .map(|s| s.saved_at)
    }
}

fn registry() -> &'static Mutex<HashMap<String, Arc<MemoryStore>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<MemoryStore>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// In-memory table backend.
pub struct MemoryBackend {
    namespace: String,
    store: Arc<MemoryStore>,
}

impl MemoryBackend {
    /// Open the store for a namespace, creating it on first use.
    ///
    /// Handles opened on the same namespace share storage for the lifetime
    /// of the process.
    pub fn open(namespace: &str) -> Self {
        let store = {
            let mut reg = registry().lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(reg.entry(namespace.to_string()).or_default())
        };
        debug!(namespace, "opened memory backend");
        Self {
            namespace: namespace.to_string(),
            store,
        }
    }

    /// The namespace this handle is bound to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Direct access to the underlying store.
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl TableBackend for MemoryBackend {
    async fn save(&self, table: &str, entries: Vec<Entry>) -> Result<()> {
        debug!(table, entries = entries.len(), "memory save");
        self.store.save(table, entries)
    }

    async fn load(&self, table: &str, keys: &[String]) -> Result<Vec<Tensor>> {
        debug!(table, keys = keys.len(), "memory load");
        self.store.load(table, keys)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}
