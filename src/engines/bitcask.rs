use std::{
    collections::{btree_map::Entry, BTreeMap},
    ffi::OsStr,
    fs::{self, File, OpenOptions},
    io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    ops::Range,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use dashmap::DashMap;
use log::{debug, error, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Deserializer;

use crate::{Adapter, Engine, JsonCodec, KvError, Lookup, Result};

/// Default number of stale bytes that triggers a compaction.
pub const COMPACTION_THRESHOLD: u64 = 1024 * 1024;

/// Options for [Bitcask].
#[derive(Debug, Clone)]
pub struct BitcaskOptions<C = JsonCodec> {
    /// Directory of the log files, created if missing. Default is `anykv.bitcask`.
    pub path: PathBuf,
    /// Compact once this many bytes of the log are stale. Default is 1 MiB.
    pub compaction_threshold: u64,
    /// Codec of the store.
    pub codec: C,
}

impl<C: Default> Default for BitcaskOptions<C> {
    fn default() -> Self {
        BitcaskOptions {
            path: PathBuf::from("anykv.bitcask"),
            compaction_threshold: COMPACTION_THRESHOLD,
            codec: C::default(),
        }
    }
}

/// The [Bitcask] stores key/value pairs into disk.
///
/// ## Terminology
///
/// * `command` - A set or remove request, serialized as one JSON object.
///
/// * `log` - An on-disk sequence of commands, in the order originally received and executed.
/// Each log file is named `{fid}.log` where `fid` grows monotonically.
///
/// * `log compaction` - As writes are issued they sometimes invalidate old log entries.
/// For example, writing key/value a = 0 then writing a = 1, makes the first log entry for "a" useless.
/// Compaction copies the live commands into a fresh file and removes the stale ones.
///
/// * `in-memory index` (or `index`) - A map of keys to log pointers.
/// When a read request is issued, the in-memory index is searched for the appropriate log pointer,
/// and when it is found the value is retrieved from the on-disk log.
#[derive(Clone)]
pub struct Bitcask {
    /// Cache of open log readers, private to this clone.
    reader: Reader,
    /// Current writer to write `command`s into disk
    cur_writer: Arc<Mutex<Writer>>,

    /// In-memory index maps from keys to [CmdPos].
    ///
    /// Rebuilt from the log files when [Bitcask]::open is called.
    index: Arc<DashMap<String, CmdPos>>,
}

impl Bitcask {
    /// Open a store over the log directory described by `options`.
    pub fn open<C>(options: BitcaskOptions<C>) -> Result<Adapter<Self, C>> {
        let engine = Self::load_dir(options.path, options.compaction_threshold)?;
        Ok(Adapter::new(engine, options.codec))
    }

    /// Open the [Bitcask] engine at a given path.
    ///
    /// This will create a new directory to store log files if the given one does not exist.
    pub fn load_dir(path: impl Into<PathBuf>, compaction_threshold: u64) -> Result<Self> {
        let data_path = Arc::new(path.into());
        fs::create_dir_all(&*data_path)?;
        debug!("Opening bitcask at {:?}", data_path);

        let mut readers = BTreeMap::new();
        let index = Arc::new(DashMap::new());

        let fids = sorted_fids(&*data_path)?;
        let mut uncompacted = 0;

        // Indexing and building cache of readers
        for &fid in &fids {
            let mut reader = new_log_reader(&data_path, fid)?;
            uncompacted += Self::load(fid, &mut reader, &index)?;
            readers.insert(fid, reader);
        }

        // Create a new log file which fid = (max of fids) + 1
        let cur_fid = fids.last().copied().unwrap_or(0) + 1;
        let cur_writer = new_log_writer(&data_path, cur_fid)?;

        let reader = Reader {
            data_path: Arc::clone(&data_path),
            safe_point: Arc::new(AtomicU64::new(0)),
            readers: Mutex::new(readers),
        };

        let writer = Writer {
            data_path: Arc::clone(&data_path),
            reader: reader.detached(),
            cur_writer,
            cur_fid,
            uncompacted,
            compaction_threshold,
            index: Arc::clone(&index),
        };

        Ok(Self {
            reader,
            cur_writer: Arc::new(Mutex::new(writer)),
            index,
        })
    }

    /// Clears stale commands from the log now, regardless of the threshold.
    pub fn compact(&self) -> Result<()> {
        self.cur_writer.lock().compact()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if no key is stored.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Load the whole log file and store value locations in the index map.
    ///
    /// Returns how many bytes can be saved after a compaction.
    fn load(
        fid: u64,
        reader: &mut BufReaderWithPos<File>,
        index: &DashMap<String, CmdPos>,
    ) -> Result<u64> {
        let mut pos = reader.seek(SeekFrom::Start(0))?;
        let mut uncompacted = 0;
        // deserialize all `command`s of this log file into a iterator
        let mut stream = Deserializer::from_reader(reader).into_iter::<Cmd>();

        while let Some(cmd) = stream.next() {
            let new_pos = stream.byte_offset() as u64;
            match cmd? {
                Cmd::Set { key, .. } => {
                    if let Some(old_cmd) = index.insert(key, (fid, pos..new_pos).into()) {
                        uncompacted += old_cmd.len;
                    }
                }
                Cmd::Rm { key } => {
                    if let Some((.., old_cmd)) = index.remove(&key) {
                        uncompacted += old_cmd.len;
                    }
                    // the "remove" command itself can be deleted in the next compaction.
                    // so we add its length to `uncompacted`.
                    uncompacted += new_pos - pos;
                }
            }
            pos = new_pos;
        }

        Ok(uncompacted)
    }
}

impl Engine for Bitcask {
    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.cur_writer.lock().set(key.to_owned(), value)
    }

    fn get(&self, key: &str) -> Result<Lookup<Vec<u8>>> {
        loop {
            // copy the position out so the index shard is not held during IO
            let cmd_pos = match self.index.get(key) {
                Some(entry) => entry.value().clone(),
                None => return Ok(Lookup::Miss),
            };
            match self.reader.read_command(&cmd_pos) {
                Ok(value) => return Ok(Lookup::Hit(value)),
                // a compaction moved the command and removed its old file
                Err(_) if self.reader.is_stale(cmd_pos.fid) => {
                    debug!("Retrying read of {:?} after compaction", key);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.cur_writer.lock().rm(key)
    }

    fn close(self) -> Result<()> {
        debug!("Closing bitcask at {:?}", self.reader.data_path);
        self.cur_writer.lock().cur_writer.flush()?;
        Ok(())
    }
}

/// Log readers keyed by fid, shared by everything reading through one handle.
struct Reader {
    data_path: Arc<PathBuf>,
    // generation file number of the latest compaction file
    safe_point: Arc<AtomicU64>,
    readers: Mutex<BTreeMap<u64, BufReaderWithPos<File>>>,
}

impl Reader {
    /// A reader sharing the path and safe point but with its own file handles.
    fn detached(&self) -> Reader {
        Reader {
            data_path: Arc::clone(&self.data_path),
            safe_point: Arc::clone(&self.safe_point),
            readers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns `true` if the log file `fid` was superseded by a compaction.
    fn is_stale(&self, fid: u64) -> bool {
        fid < self.safe_point.load(Ordering::SeqCst)
    }

    /// Close file handles with generation file number less than safe_point.
    ///
    /// `safe_point` is updated to the latest compaction gen after a compaction finishes.
    /// The compaction generation contains the sum of all operations before it and the
    /// in-memory index contains no entries with generation number less than safe_point.
    /// So we can safely close those file handles and the stale files can be deleted.
    fn close_stale_handles(&self, readers: &mut BTreeMap<u64, BufReaderWithPos<File>>) {
        let safe_point = self.safe_point.load(Ordering::SeqCst);
        while let Some(&first_fid) = readers.keys().next() {
            if safe_point <= first_fid {
                break;
            }
            readers.remove(&first_fid);
        }
    }

    /// Read the on-disk command at `cmd_pos` and apply `f` to it.
    fn read_and<F, R>(&self, cmd_pos: &CmdPos, f: F) -> Result<R>
    where
        F: FnOnce(io::Take<&mut BufReaderWithPos<File>>) -> Result<R>,
    {
        let mut readers = self.readers.lock();
        self.close_stale_handles(&mut readers);

        // Open the file if we haven't opened it through this reader yet.
        let reader_with_pos = match readers.entry(cmd_pos.fid) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                entry.insert(new_log_reader(&self.data_path, cmd_pos.fid)?)
            }
        };

        reader_with_pos.seek(SeekFrom::Start(cmd_pos.pos))?;
        // cmd_reader read up to cmd_pos.len bytes
        let cmd_reader = reader_with_pos.take(cmd_pos.len);
        f(cmd_reader)
    }

    // Read the command on the disk and return the stored value.
    fn read_command(&self, cmd_pos: &CmdPos) -> Result<Vec<u8>> {
        self.read_and(cmd_pos, |cmd_reader| {
            if let Cmd::Set { value, .. } = serde_json::from_reader(cmd_reader)? {
                Ok(value)
            } else {
                Err(KvError::UnknownCommand)
            }
        })
    }
}

impl Clone for Reader {
    fn clone(&self) -> Self {
        self.detached()
    }
}

struct Writer {
    data_path: Arc<PathBuf>,
    reader: Reader,
    cur_writer: BufWriterWithPos<File>,
    cur_fid: u64,
    /// The number of bytes representing "stale" commands that could be
    /// deleted during a compaction.
    uncompacted: u64,
    compaction_threshold: u64,
    index: Arc<DashMap<String, CmdPos>>,
}

impl Writer {
    fn set(&mut self, key: String, value: Vec<u8>) -> Result<()> {
        let cmd = Cmd::set(key, value);
        let pos = self.cur_writer.pos;
        serde_json::to_writer(&mut self.cur_writer, &cmd)?;
        self.cur_writer.flush()?;

        if let Cmd::Set { key, .. } = cmd {
            self.uncompacted += self
                .index
                .insert(key, (self.cur_fid, pos..self.cur_writer.pos).into())
                .map(|cmd_pos| cmd_pos.len)
                .unwrap_or(0)
        }

        self.maybe_compact()
    }

    fn rm(&mut self, key: &str) -> Result<()> {
        if !self.index.contains_key(key) {
            return Ok(());
        }

        let cmd = Cmd::rm(key.to_owned());
        let pos = self.cur_writer.pos;
        serde_json::to_writer(&mut self.cur_writer, &cmd)?;
        self.cur_writer.flush()?;

        if let Some((.., old_cmd_pos)) = self.index.remove(key) {
            self.uncompacted += old_cmd_pos.len;
        }
        // the "remove" command itself can be deleted in the next compaction
        // so we add its length to `uncompacted`
        self.uncompacted += self.cur_writer.pos - pos;

        self.maybe_compact()
    }

    fn maybe_compact(&mut self) -> Result<()> {
        if self.uncompacted > self.compaction_threshold {
            let now = Instant::now();
            info!("Compaction starts");
            self.compact()?;
            info!("Compaction finished, cost {:?}", now.elapsed());
        }
        Ok(())
    }

    /// Clears stale log files.
    fn compact(&mut self) -> Result<()> {
        // increase current fid by 2. current_fid + 1 is for the compaction file.
        let compaction_fid = self.cur_fid + 1;
        self.cur_fid += 2;
        self.cur_writer = new_log_writer(&self.data_path, self.cur_fid)?;

        let mut compaction_writer = new_log_writer(&self.data_path, compaction_fid)?;

        let mut new_pos = 0;
        let mut moved = Vec::with_capacity(self.index.len());
        // copy all valid commands(from index) into compaction file, be careful about deadlock when iterating dashmap
        for entry in self.index.iter() {
            let len = self.reader.read_and(entry.value(), |mut cmd_reader| {
                Ok(io::copy(&mut cmd_reader, &mut compaction_writer)?)
            })?;

            let cmd_pos = CmdPos {
                fid: compaction_fid,
                pos: new_pos,
                len,
            };
            moved.push((entry.key().clone(), cmd_pos));

            new_pos += len;
        }
        compaction_writer.flush()?;

        // publish new positions only once they are on disk; the writer lock
        // keeps every entry unchanged until then
        for (key, cmd_pos) in moved {
            if let Some(mut entry) = self.index.get_mut(&key) {
                *entry = cmd_pos;
            }
        }

        // update safe_point
        self.reader
            .safe_point
            .store(compaction_fid, Ordering::SeqCst);
        let mut readers = self.reader.readers.lock();
        self.reader.close_stale_handles(&mut readers);
        drop(readers);

        // Other handles close their stale readers on their next read. On Unix
        // the files are gone once the last handle closes; on Windows the
        // removal below fails and is retried by the next compaction.
        let stale_fids = sorted_fids(&*self.data_path)?
            .into_iter()
            .filter(|&fid| fid < compaction_fid);

        for stale_fid in stale_fids {
            let file_path = log_path(&self.data_path, stale_fid);
            if let Err(e) = fs::remove_file(&file_path) {
                error!("{:?} cannot be deleted: {}", file_path, e);
            }
        }
        self.uncompacted = 0;

        Ok(())
    }
}

/// Return a sorted list of log file generated by [Bitcask].
fn sorted_fids(path: impl AsRef<Path>) -> Result<Vec<u64>> {
    let mut fids: Vec<u64> = fs::read_dir(&path)?
        .flat_map(|res| -> Result<_> { Ok(res?.path()) })
        .filter(|path| path.is_file() && path.extension() == Some("log".as_ref()))
        .flat_map(|path| {
            path.file_name()
                .and_then(OsStr::to_str)
                .map(|s| s.trim_end_matches(".log"))
                .map(str::parse::<u64>)
        })
        .flatten()
        .collect();

    fids.sort_unstable();

    Ok(fids)
}

/// join path: {dir}/{fid}.log
fn log_path(dir: &Path, fid: u64) -> PathBuf {
    dir.join(format!("{}.log", fid))
}

/// Create a new [BufReaderWithPos] for `fid`'s log file.
fn new_log_reader(dir: &Path, fid: u64) -> Result<BufReaderWithPos<File>> {
    BufReaderWithPos::new(File::open(log_path(dir, fid))?)
}

/// Creat a new log file with `fid` and return the writer to the log.
fn new_log_writer(path: &Path, fid: u64) -> Result<BufWriterWithPos<File>> {
    let path = log_path(path, fid);
    let writer = BufWriterWithPos::new(
        OpenOptions::new()
            .create(true)
            .write(true)
            .append(true)
            .open(&path)?,
    )?;

    Ok(writer)
}

#[derive(Debug, Serialize, Deserialize)]
enum Cmd {
    Set {
        key: String,
        #[serde(with = "base64_bytes")]
        value: Vec<u8>,
    },
    Rm {
        key: String,
    },
}

impl Cmd {
    fn set(key: String, value: Vec<u8>) -> Self {
        Cmd::Set { key, value }
    }

    fn rm(key: String) -> Self {
        Cmd::Rm { key }
    }
}

/// Values are arbitrary bytes; keep them compact inside the JSON log.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone)]
/// In-memory representation of a `command`.
///
/// Indicates where we can find it.
struct CmdPos {
    /// which file this commmand belong to
    fid: u64,
    /// start position of command
    pos: u64,
    /// length of command
    len: u64,
}

impl From<(u64, Range<u64>)> for CmdPos {
    fn from((fid, range): (u64, Range<u64>)) -> Self {
        CmdPos {
            fid,
            pos: range.start,
            len: range.end - range.start,
        }
    }
}

/// A `BufReader` with position where it read to
struct BufReaderWithPos<R: Read + Seek> {
    reader: BufReader<R>,
    pos: u64,
}

impl<R: Read + Seek> BufReaderWithPos<R> {
    fn new(mut inner: R) -> Result<Self> {
        let pos = inner.stream_position()?;
        Ok(BufReaderWithPos {
            reader: BufReader::new(inner),
            pos,
        })
    }
}

impl<R: Read + Seek> Read for BufReaderWithPos<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.reader.read(buf)?;
        self.pos += len as u64;
        Ok(len)
    }
}

impl<R: Read + Seek> Seek for BufReaderWithPos<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.reader.seek(pos)?;
        Ok(self.pos)
    }
}

/// A `BufWriter` with position where it written to
struct BufWriterWithPos<W: Write + Seek> {
    writer: BufWriter<W>,
    pos: u64,
}

impl<W: Write + Seek> BufWriterWithPos<W> {
    fn new(mut inner: W) -> Result<Self> {
        let pos = inner.seek(SeekFrom::End(0))?;
        Ok(BufWriterWithPos {
            writer: BufWriter::new(inner),
            pos,
        })
    }
}

impl<W: Write + Seek> Write for BufWriterWithPos<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = self.writer.write(buf)?;
        self.pos += len as u64;
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl<W: Write + Seek> Seek for BufWriterWithPos<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.writer.seek(pos)?;
        Ok(self.pos)
    }
}
