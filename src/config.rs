//! Engine selection at runtime, driven by a TOML config file.
//!
//! ```toml
//! engine = "sled"
//! codec = "msgpack"
//! path = "data/sled"
//!
//! [sled]
//! tree = "users"
//! flush_every_write = true
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    encoding::Codec, Adapter, Bitcask, BitcaskOptions, Encoding, FileEngine, FileOptions, Lookup,
    MemoryEngine, MemoryOptions, Result, SledEngine, SledOptions, Store, SyncMapEngine,
};

/// Storage engines selectable at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// [MemoryEngine]
    Memory,
    /// [SyncMapEngine]
    #[clap(name = "syncmap")]
    SyncMap,
    /// [SledEngine]
    Sled,
    /// [Bitcask]
    #[default]
    Bitcask,
    /// [FileEngine]
    File,
}

/// Settings of the `[sled]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SledSection {
    /// Tree keys are stored in
    pub tree: Option<String>,
    /// Flush after every write
    pub flush_every_write: Option<bool>,
    /// Page cache size in bytes
    pub cache_capacity: Option<u64>,
}

/// Settings of the `[bitcask]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BitcaskSection {
    /// Stale bytes that trigger a compaction
    pub compaction_threshold: Option<u64>,
}

/// Settings of the `[file]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSection {
    /// File name extension
    pub extension: Option<String>,
}

/// Which engine to open, where, and with which codec.
///
/// Unset fields fall back to the defaults of the engine's options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Engine to open
    pub engine: EngineKind,
    /// Codec of the store
    pub codec: Encoding,
    /// Data location of persistent engines
    pub path: Option<PathBuf>,
    /// sled settings
    pub sled: SledSection,
    /// bitcask settings
    pub bitcask: BitcaskSection,
    /// file settings
    pub file: FileSection,
}

impl Config {
    /// Parse a config from TOML text.
    pub fn from_toml(text: &str) -> Result<Config> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        debug!("Loading config from {:?}", path.as_ref());
        Config::from_toml(&fs::read_to_string(path)?)
    }

    /// Open the configured engine.
    pub fn open(&self) -> Result<AnyStore> {
        let codec = self.codec;
        debug!("Opening {:?} engine with {:?} codec", self.engine, codec);
        Ok(match self.engine {
            EngineKind::Memory => AnyStore::Memory(MemoryEngine::open(MemoryOptions {
                initial_capacity: 0,
                codec,
            })),
            EngineKind::SyncMap => AnyStore::SyncMap(SyncMapEngine::open(codec)),
            EngineKind::Sled => {
                let mut options = SledOptions::<Encoding> {
                    codec,
                    ..Default::default()
                };
                if let Some(path) = &self.path {
                    options.path = path.clone();
                }
                if let Some(tree) = &self.sled.tree {
                    options.tree = tree.clone();
                }
                if let Some(flush) = self.sled.flush_every_write {
                    options.flush_every_write = flush;
                }
                if let Some(capacity) = self.sled.cache_capacity {
                    options.cache_capacity = capacity;
                }
                AnyStore::Sled(SledEngine::open(options)?)
            }
            EngineKind::Bitcask => {
                let mut options = BitcaskOptions::<Encoding> {
                    codec,
                    ..Default::default()
                };
                if let Some(path) = &self.path {
                    options.path = path.clone();
                }
                if let Some(threshold) = self.bitcask.compaction_threshold {
                    options.compaction_threshold = threshold;
                }
                AnyStore::Bitcask(Bitcask::open(options)?)
            }
            EngineKind::File => {
                let mut options = FileOptions::<Encoding> {
                    codec,
                    extension: self.file.extension.clone(),
                    ..Default::default()
                };
                if let Some(path) = &self.path {
                    options.directory = path.clone();
                }
                AnyStore::File(FileEngine::open(options)?)
            }
        })
    }
}

/// A store whose engine was chosen at runtime.
pub enum AnyStore {
    /// In-memory map
    Memory(Adapter<MemoryEngine, Encoding>),
    /// Sharded concurrent map
    SyncMap(Adapter<SyncMapEngine, Encoding>),
    /// sled database
    Sled(Adapter<SledEngine, Encoding>),
    /// bitcask log
    Bitcask(Adapter<Bitcask, Encoding>),
    /// One file per key
    File(Adapter<FileEngine, Encoding>),
}

macro_rules! dispatch {
    ($store:expr, $s:ident => $body:expr) => {
        match $store {
            AnyStore::Memory($s) => $body,
            AnyStore::SyncMap($s) => $body,
            AnyStore::Sled($s) => $body,
            AnyStore::Bitcask($s) => $body,
            AnyStore::File($s) => $body,
        }
    };
}

impl Store for AnyStore {
    type Codec = Encoding;

    fn set<T>(&self, key: &str, value: &T) -> Result<()>
    where
        Encoding: Codec<T>,
    {
        dispatch!(self, s => s.set(key, value))
    }

    fn get<T>(&self, key: &str) -> Result<Lookup<T>>
    where
        Encoding: Codec<T>,
    {
        dispatch!(self, s => s.get(key))
    }

    fn delete(&self, key: &str) -> Result<()> {
        dispatch!(self, s => s.delete(key))
    }

    fn close(self) -> Result<()> {
        dispatch!(self, s => s.close())
    }
}
