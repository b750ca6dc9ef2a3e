use crate::{Lookup, Result};

mod bitcask;
mod file;
mod memory;
#[cfg(feature = "s3")]
mod s3;
mod sled;
mod syncmap;

pub use self::bitcask::{Bitcask, BitcaskOptions};
pub use self::file::{FileEngine, FileOptions};
pub use self::memory::{MemoryEngine, MemoryOptions};
#[cfg(feature = "s3")]
pub use self::s3::{S3Engine, S3Options};
pub use self::sled::{SledEngine, SledOptions};
pub use self::syncmap::SyncMapEngine;

/// Defines the byte-level interface every storage backend implements.
///
/// Keys reaching an engine are already validated and values already
/// encoded; an engine only moves bytes and translates its own
/// "not found" signal into `Lookup::Miss`.
pub trait Engine {
    /// Store `value` under `key`, overwriting any previous value.
    fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Get the bytes stored under `key`.
    ///
    /// Returns `Lookup::Miss` if the given key does not exist.
    fn get(&self, key: &str) -> Result<Lookup<Vec<u8>>>;

    /// Remove a given key
    ///
    /// Removing a key that does not exist is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Release the resources held by the engine.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}
