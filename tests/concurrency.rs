use anykv::{
    Bitcask, BitcaskOptions, Codec, Encoding, FileEngine, FileOptions, JsonCodec, Lookup,
    MemoryEngine, MemoryOptions, Result, SledEngine, SledOptions, Store, SyncMapEngine,
};
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_utils::thread;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

const TASK_NUM: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Record {
    id: usize,
    name: String,
}

/// Read, write, read again on a key nobody else touches.
fn cycle<S: Store>(store: &S, id: usize) -> Result<()>
where
    S::Codec: Codec<Record>,
{
    let key = format!("key{}", id);
    assert_eq!(store.get::<Record>(&key)?, Lookup::Miss);

    let record = Record {
        id,
        name: format!("record {}", id),
    };
    store.set(&key, &record)?;
    assert_eq!(store.get::<Record>(&key)?, Lookup::Hit(record));
    Ok(())
}

fn scoped_threads<S: Store + Sync>(store: &S) -> Result<()>
where
    S::Codec: Codec<Record>,
{
    thread::scope(|s| {
        let handles: Vec<_> = (0..TASK_NUM)
            .map(|id| s.spawn(move |_| cycle(store, id)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker panicked"))
            .collect::<Result<()>>()
    })
    .expect("scope panicked")
}

fn rayon_tasks<S: Store + Sync>(store: &S) -> Result<()>
where
    S::Codec: Codec<Record>,
{
    (0..TASK_NUM)
        .into_par_iter()
        .try_for_each(|id| cycle(store, id))
}

#[test]
fn memory_concurrent_cycles() -> Result<()> {
    let store = MemoryEngine::open(MemoryOptions::<JsonCodec>::default());
    scoped_threads(&store)?;
    assert_eq!(store.engine().len(), TASK_NUM);
    Ok(())
}

#[test]
fn syncmap_concurrent_cycles() -> Result<()> {
    let store = SyncMapEngine::open(Encoding::MsgPack);
    rayon_tasks(&store)?;
    assert_eq!(store.engine().len(), TASK_NUM);
    Ok(())
}

#[test]
fn sled_concurrent_cycles() -> Result<()> {
    let store = SledEngine::open(SledOptions::<Encoding> {
        temporary: true,
        codec: Encoding::Bincode,
        ..Default::default()
    })?;
    scoped_threads(&store)?;
    assert_eq!(store.engine().tree().len(), TASK_NUM);
    Ok(())
}

#[test]
fn bitcask_concurrent_cycles() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = Bitcask::open(BitcaskOptions::<JsonCodec> {
        path: temp_dir.path().to_path_buf(),
        ..Default::default()
    })?;
    rayon_tasks(&store)?;
    assert_eq!(store.engine().len(), TASK_NUM);
    Ok(())
}

// Readers must keep seeing live keys while a writer forces compactions
#[test]
fn bitcask_reads_survive_compaction() -> Result<()> {
    const KEY_NUM: i32 = 200;
    const READER_NUM: usize = 4;

    let temp_dir = TempDir::new()?;
    let store = Bitcask::open(BitcaskOptions::<JsonCodec> {
        path: temp_dir.path().to_path_buf(),
        compaction_threshold: 2048,
        codec: JsonCodec,
    })?;
    for i in 0..KEY_NUM {
        store.set(&format!("key{}", i), &i)?;
    }

    let done = AtomicBool::new(false);
    thread::scope(|s| {
        let readers: Vec<_> = (0..READER_NUM)
            .map(|_| {
                s.spawn(|_| -> Result<()> {
                    while !done.load(Ordering::SeqCst) {
                        for i in 0..KEY_NUM {
                            assert_eq!(store.get::<i32>(&format!("key{}", i))?, Lookup::Hit(i));
                        }
                    }
                    Ok(())
                })
            })
            .collect();

        let written = (0..3000).try_for_each(|i| store.set("hot", &i));
        done.store(true, Ordering::SeqCst);
        written?;
        readers
            .into_iter()
            .map(|handle| handle.join().expect("reader panicked"))
            .collect::<Result<()>>()
    })
    .expect("scope panicked")?;

    assert_eq!(store.get::<i32>("hot")?, Lookup::Hit(2999));
    Ok(())
}

#[test]
fn bitcask_clones_share_index() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let engine = Bitcask::load_dir(temp_dir.path(), 1024 * 1024)?;

    let handles: Vec<_> = (0..TASK_NUM)
        .map(|id| {
            let store = anykv::Adapter::new(engine.clone(), JsonCodec);
            std::thread::spawn(move || cycle(&store, id))
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked")?;
    }
    assert_eq!(engine.len(), TASK_NUM);
    Ok(())
}

#[test]
fn file_concurrent_cycles() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileEngine::open(FileOptions::<JsonCodec> {
        directory: temp_dir.path().to_path_buf(),
        ..Default::default()
    })?;
    scoped_threads(&store)?;
    assert_eq!(std::fs::read_dir(temp_dir.path())?.count(), TASK_NUM);
    Ok(())
}

#[test]
fn concurrent_writers_on_one_key() -> Result<()> {
    let store = MemoryEngine::open(MemoryOptions::<JsonCodec>::default());
    (0..TASK_NUM).into_par_iter().try_for_each(|id| {
        store.set(
            "shared",
            &Record {
                id,
                name: String::from("shared"),
            },
        )
    })?;

    // last write wins; the value is one of the written records, never torn
    match store.get::<Record>("shared")? {
        Lookup::Hit(record) => {
            assert!(record.id < TASK_NUM);
            assert_eq!(record.name, "shared");
        }
        Lookup::Miss => panic!("shared key is missing"),
    }
    Ok(())
}
