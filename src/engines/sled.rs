use std::path::PathBuf;

use log::debug;
use sled::{Db, Tree};

use crate::{Adapter, Engine, JsonCodec, Lookup, Result};

/// Options for [SledEngine].
#[derive(Debug, Clone)]
pub struct SledOptions<C = JsonCodec> {
    /// Directory of the database. Default is `anykv.sled`.
    pub path: PathBuf,
    /// Name of the tree keys are stored in, created if missing.
    /// Default is `anykv`.
    pub tree: String,
    /// Flush to disk after every write. Default is `false`.
    pub flush_every_write: bool,
    /// Page cache size in bytes. Default is 1 GiB.
    pub cache_capacity: u64,
    /// Remove the database when it is dropped. Default is `false`.
    pub temporary: bool,
    /// Codec of the store.
    pub codec: C,
}

impl<C: Default> Default for SledOptions<C> {
    fn default() -> Self {
        SledOptions {
            path: PathBuf::from("anykv.sled"),
            tree: String::from("anykv"),
            flush_every_write: false,
            cache_capacity: 1024 * 1024 * 1024,
            temporary: false,
            codec: C::default(),
        }
    }
}

/// Kvs engine implementation by sled database
#[derive(Clone)]
pub struct SledEngine {
    db: Db,
    tree: Tree,
    flush_every_write: bool,
}

impl SledEngine {
    /// Creates a `SledEngine` from an opened `sled::Db`, using `tree` as container.
    pub fn new(db: Db, tree: &str) -> Result<SledEngine> {
        let tree = db.open_tree(tree)?;
        Ok(SledEngine {
            db,
            tree,
            flush_every_write: false,
        })
    }

    /// Open the database described by `options` and return a store over it.
    pub fn open<C>(options: SledOptions<C>) -> Result<Adapter<Self, C>> {
        debug!("Opening sled database at {:?}", options.path);
        let db = sled::Config::new()
            .path(&options.path)
            .cache_capacity(options.cache_capacity)
            .temporary(options.temporary)
            .open()?;
        let mut engine = SledEngine::new(db, &options.tree)?;
        engine.flush_every_write = options.flush_every_write;
        Ok(Adapter::new(engine, options.codec))
    }

    /// The tree keys are stored in.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    fn maybe_flush(&self) -> Result<()> {
        if self.flush_every_write {
            self.tree.flush()?;
        }
        Ok(())
    }
}

impl Engine for SledEngine {
    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.tree.insert(key, value)?;
        self.maybe_flush()
    }

    fn get(&self, key: &str) -> Result<Lookup<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()).into())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.tree.remove(key)?;
        self.maybe_flush()
    }

    fn close(self) -> Result<()> {
        debug!("Flushing sled database");
        self.db.flush()?;
        Ok(())
    }
}
