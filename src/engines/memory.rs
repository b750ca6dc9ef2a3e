use std::collections::HashMap;

use parking_lot::RwLock;

use crate::{Adapter, Engine, JsonCodec, Lookup, Result};

/// Options for [MemoryEngine].
#[derive(Debug, Clone, Default)]
pub struct MemoryOptions<C = JsonCodec> {
    /// Number of entries to preallocate.
    pub initial_capacity: usize,
    /// Codec of the store.
    pub codec: C,
}

/// An in-memory engine: a `HashMap` behind a reader/writer lock.
///
/// Reads hold the shared lock only while copying the bytes out, so
/// decoding never blocks writers.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryEngine {
    /// Create an empty engine with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        MemoryEngine {
            data: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Open a store backed by a fresh `MemoryEngine`.
    pub fn open<C>(options: MemoryOptions<C>) -> Adapter<Self, C> {
        Adapter::new(Self::with_capacity(options.initial_capacity), options.codec)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Engine for MemoryEngine {
    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.data.write().insert(key.to_owned(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Lookup<Vec<u8>>> {
        let value = self.data.read().get(key).cloned();
        Ok(value.into())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}
