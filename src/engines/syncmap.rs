use dashmap::DashMap;

use crate::{Adapter, Engine, Lookup, Result};

/// An in-memory engine over a sharded concurrent map.
///
/// Unlike [MemoryEngine](super::MemoryEngine) there is no single table
/// lock: writers to different shards never contend.
#[derive(Debug, Default)]
pub struct SyncMapEngine {
    data: DashMap<String, Vec<u8>>,
}

impl SyncMapEngine {
    /// Open a store backed by a fresh `SyncMapEngine`.
    pub fn open<C>(codec: C) -> Adapter<Self, C> {
        Adapter::new(Self::default(), codec)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Engine for SyncMapEngine {
    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.data.insert(key.to_owned(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Lookup<Vec<u8>>> {
        // clone out so the shard guard is dropped before decoding
        let value = self.data.get(key).map(|entry| entry.value().clone());
        Ok(value.into())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.data.remove(key);
        Ok(())
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}
