use std::{
    fmt::Write as _,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use log::debug;

use crate::{encoding::Format, Adapter, Engine, JsonCodec, Lookup, Result};

/// Options for [FileEngine].
#[derive(Debug, Clone)]
pub struct FileOptions<C = JsonCodec> {
    /// Directory the files are written to, created if missing.
    /// Default is `anykv.files`.
    pub directory: PathBuf,
    /// Extension appended to every file name. Defaults to the codec's,
    /// e.g. `.json`.
    pub extension: Option<String>,
    /// Codec of the store.
    pub codec: C,
}

impl<C: Default> Default for FileOptions<C> {
    fn default() -> Self {
        FileOptions {
            directory: PathBuf::from("anykv.files"),
            extension: None,
            codec: C::default(),
        }
    }
}

/// Stores every key in its own file.
///
/// Keys are escaped so any non-empty string maps to a single file name.
/// Escaping can triple a key's length, so keys whose file name exceeds the
/// filesystem limit (255 bytes on most) fail with [KvError::Io](crate::KvError::Io).
/// Writes go to a temporary file which is then renamed over the target,
/// so readers never observe a partial value.
#[derive(Debug, Clone)]
pub struct FileEngine {
    directory: PathBuf,
    extension: String,
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

impl FileEngine {
    /// Use `directory` for the files, creating it if it does not exist.
    pub fn new(directory: impl Into<PathBuf>, extension: impl Into<String>) -> Result<FileEngine> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(FileEngine {
            directory,
            extension: extension.into(),
        })
    }

    /// Open a store writing one file per key as described by `options`.
    pub fn open<C: Format>(options: FileOptions<C>) -> Result<Adapter<Self, C>> {
        let extension = options
            .extension
            .unwrap_or_else(|| options.codec.extension().to_owned());
        debug!(
            "Opening file store at {:?} ({} codec)",
            options.directory,
            options.codec.name()
        );
        let engine = FileEngine::new(options.directory, extension)?;
        Ok(Adapter::new(engine, options.codec))
    }

    /// The directory files are stored in.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.directory
            .join(format!("{}{}", escape_key(key), self.extension))
    }
}

impl Engine for FileEngine {
    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let path = self.path_of(key);
        let tmp_path = self.directory.join(format!(
            ".{}.{}.tmp",
            escape_key(key),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&value)?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Lookup<Vec<u8>>> {
        match fs::read(self.path_of(key)) {
            Ok(bytes) => Ok(Lookup::Hit(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Lookup::Miss),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_of(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

/// Percent-escapes every byte that is not ASCII alphanumeric, `-` or `_`.
fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            escaped.push(byte as char);
        } else {
            // writing to a String never fails
            let _ = write!(escaped, "%{:02X}", byte);
        }
    }
    escaped
}
