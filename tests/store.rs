use anykv::{
    BincodeCodec, Bitcask, BitcaskOptions, Codec, Encoding, FileEngine, FileOptions, JsonCodec,
    KvError, Lookup, MemoryEngine, MemoryOptions, MsgPackCodec, ProtobufCodec, Result, SledEngine,
    SledOptions, Store, SyncMapEngine, TomlCodec,
};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

const ENCODINGS: [Encoding; 4] = [
    Encoding::Json,
    Encoding::Bincode,
    Encoding::MsgPack,
    Encoding::Toml,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Foo {
    bar: String,
    count: u32,
    tags: Vec<String>,
}

fn foo(bar: &str) -> Foo {
    Foo {
        bar: bar.to_owned(),
        count: 42,
        tags: vec!["a".to_owned(), "b".to_owned()],
    }
}

#[derive(Clone, PartialEq, prost::Message)]
struct FooMessage {
    #[prost(string, tag = "1")]
    bar: String,
    #[prost(uint32, tag = "2")]
    count: u32,
}

/// Checks every rule of the store contract against one store.
fn check_contract<S: Store>(store: &S) -> Result<()>
where
    S::Codec: Codec<Foo> + Codec<Option<Foo>>,
{
    // missing key is not an error
    assert_eq!(store.get::<Foo>("foo123")?, Lookup::Miss);
    store.delete("foo123")?;

    store.set("foo123", &foo("baz"))?;
    assert_eq!(store.get::<Foo>("foo123")?, Lookup::Hit(foo("baz")));

    let mut out = foo("");
    assert!(store.get_into("foo123", &mut out)?);
    assert_eq!(out, foo("baz"));

    // overwrite
    store.set("foo123", &foo("qux"))?;
    assert_eq!(store.get::<Foo>("foo123")?, Lookup::Hit(foo("qux")));

    store.delete("foo123")?;
    assert_eq!(store.get::<Foo>("foo123")?, Lookup::Miss);
    store.delete("foo123")?;

    // invalid input
    assert!(matches!(store.set("", &foo("baz")), Err(KvError::InvalidKey)));
    assert!(matches!(store.get::<Foo>(""), Err(KvError::InvalidKey)));
    assert!(matches!(store.delete(""), Err(KvError::InvalidKey)));
    assert!(matches!(
        store.set("foo123", &None::<Foo>),
        Err(KvError::InvalidValue)
    ));
    assert_eq!(store.get::<Foo>("foo123")?, Lookup::Miss);

    // keys are independent
    store.set("a", &foo("1"))?;
    store.set("b", &foo("2"))?;
    store.delete("a")?;
    assert_eq!(store.get::<Foo>("a")?, Lookup::Miss);
    assert_eq!(store.get::<Foo>("b")?, Lookup::Hit(foo("2")));
    store.delete("b")?;

    Ok(())
}

#[test]
fn memory_store() -> Result<()> {
    for codec in ENCODINGS {
        let store = MemoryEngine::open(MemoryOptions {
            initial_capacity: 16,
            codec,
        });
        check_contract(&store)?;
        store.close()?;
    }
    Ok(())
}

#[test]
fn syncmap_store() -> Result<()> {
    for codec in ENCODINGS {
        let store = SyncMapEngine::open(codec);
        check_contract(&store)?;
        store.close()?;
    }
    Ok(())
}

#[test]
fn sled_store() -> Result<()> {
    for codec in ENCODINGS {
        let store = SledEngine::open(SledOptions {
            temporary: true,
            codec,
            ..Default::default()
        })?;
        check_contract(&store)?;
        store.close()?;
    }
    Ok(())
}

#[test]
fn bitcask_store() -> Result<()> {
    for codec in ENCODINGS {
        let temp_dir = TempDir::new()?;
        let store = Bitcask::open(BitcaskOptions {
            path: temp_dir.path().to_path_buf(),
            codec,
            ..Default::default()
        })?;
        check_contract(&store)?;
        store.close()?;
    }
    Ok(())
}

#[test]
fn file_store() -> Result<()> {
    for codec in ENCODINGS {
        let temp_dir = TempDir::new()?;
        let store = FileEngine::open(FileOptions {
            directory: temp_dir.path().to_path_buf(),
            codec,
            ..Default::default()
        })?;
        check_contract(&store)?;
        store.close()?;
    }
    Ok(())
}

#[test]
fn typed_codecs() -> Result<()> {
    check_contract(&MemoryEngine::open(MemoryOptions::<JsonCodec>::default()))?;
    check_contract(&MemoryEngine::open(MemoryOptions::<BincodeCodec>::default()))?;
    check_contract(&MemoryEngine::open(MemoryOptions::<MsgPackCodec>::default()))?;
    check_contract(&MemoryEngine::open(MemoryOptions::<TomlCodec>::default()))?;
    Ok(())
}

#[test]
fn protobuf_codec() -> Result<()> {
    let store = SyncMapEngine::open(ProtobufCodec);
    let message = FooMessage {
        bar: "baz".to_owned(),
        count: 7,
    };

    assert_eq!(store.get::<FooMessage>("foo123")?, Lookup::Miss);
    store.set("foo123", &message)?;
    assert_eq!(store.get::<FooMessage>("foo123")?, Lookup::Hit(message));
    store.delete("foo123")?;
    assert_eq!(store.get::<FooMessage>("foo123")?, Lookup::Miss);
    Ok(())
}

#[test]
fn codec_switch_keeps_semantics() -> Result<()> {
    let json = MemoryEngine::open(MemoryOptions::<JsonCodec>::default());
    let bincode = MemoryEngine::open(MemoryOptions::<BincodeCodec>::default());

    json.set("foo123", &foo("baz"))?;
    bincode.set("foo123", &foo("baz"))?;
    assert_eq!(
        json.get::<Foo>("foo123")?,
        bincode.get::<Foo>("foo123")?
    );
    Ok(())
}

#[test]
fn wrong_output_type_reports_found() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileEngine::open(FileOptions::<JsonCodec> {
        directory: temp_dir.path().to_path_buf(),
        ..Default::default()
    })?;
    store.set("foo123", &vec![1, 2, 3])?;

    let err = store.get::<Foo>("foo123").unwrap_err();
    assert!(err.key_found());

    let mut out = foo("untouched");
    assert!(store.get_into("foo123", &mut out).is_err());
    assert_eq!(out, foo("untouched"));
    Ok(())
}

#[test]
fn toml_rejects_non_table_value() {
    let store = MemoryEngine::open(MemoryOptions::<TomlCodec>::default());
    let res = store.set("foo123", &String::from("bar"));
    assert!(matches!(res, Err(KvError::Codec(_))));
    assert!(store.engine().is_empty());
}

#[test]
fn sled_reopen_keeps_data() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let options = || SledOptions::<JsonCodec> {
        path: temp_dir.path().to_path_buf(),
        tree: "users".to_owned(),
        flush_every_write: true,
        ..Default::default()
    };

    let store = SledEngine::open(options())?;
    store.set("foo123", &foo("baz"))?;
    store.close()?;

    let store = SledEngine::open(options())?;
    assert_eq!(store.get::<Foo>("foo123")?, Lookup::Hit(foo("baz")));
    assert_eq!(store.engine().tree().len(), 1);
    Ok(())
}
