#![deny(missing_docs)]
//! A uniform key/value store interface over pluggable engines and codecs.
//!
//! Application code talks to the [Store] trait. An [Adapter] pairs one
//! [Engine] (an in-memory map, sled, a bitcask log, plain files, S3) with
//! one [Codec] (JSON, bincode, MessagePack, TOML, protobuf), so swapping
//! the backend or the value format needs no change at the call site.
//!
//! ```
//! use anykv::{JsonCodec, Lookup, MemoryEngine, MemoryOptions, Store};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Foo {
//!     bar: String,
//! }
//!
//! # fn main() -> anykv::Result<()> {
//! let store = MemoryEngine::open(MemoryOptions::<JsonCodec>::default());
//! store.set("foo123", &Foo { bar: "baz".into() })?;
//! assert_eq!(store.get::<Foo>("foo123")?, Lookup::Hit(Foo { bar: "baz".into() }));
//!
//! store.delete("foo123")?;
//! assert_eq!(store.get::<Foo>("foo123")?, Lookup::Miss);
//! # Ok(())
//! # }
//! ```

mod error;
pub use error::{CodecError, KvError, Result};

mod store;
pub use store::{validate_key, Adapter, Lookup, Store};

pub mod encoding;
pub use encoding::{
    BincodeCodec, Codec, Encoding, Format, JsonCodec, MsgPackCodec, ProtobufCodec, TomlCodec,
};

mod engines;
pub use engines::*;

pub mod args;
pub mod config;
pub use config::{AnyStore, Config};
