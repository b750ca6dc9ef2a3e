//! Pluggable value codecs.
//!
//! A codec turns a value into the bytes handed to an engine and back.
//! Every value is marshalled whole, in memory.

use clap::ValueEnum;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::CodecError;

mod nil;
pub use self::nil::is_nil;

/// Converts values of type `T` to and from bytes.
pub trait Codec<T> {
    /// Encode `value`.
    fn marshal(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode a value previously produced by [Codec::marshal].
    fn unmarshal(&self, bytes: &[u8]) -> Result<T, CodecError>;

    /// Whether `value` is the nil value, which must never be stored.
    fn is_nil(&self, _value: &T) -> bool {
        false
    }
}

/// Describes the serialization format a codec produces.
pub trait Format {
    /// Short lowercase name, e.g. `json`
    fn name(&self) -> &'static str;

    /// File extension including the leading dot, e.g. `.json`
    fn extension(&self) -> &'static str;
}

/// JSON text via `serde_json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for JsonCodec {
    fn marshal(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn is_nil(&self, value: &T) -> bool {
        is_nil(value)
    }
}

/// Native binary object format via `bincode`.
///
/// Not self-describing: the reading type must match the written one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BincodeCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for BincodeCodec {
    fn marshal(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(value)?)
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn is_nil(&self, value: &T) -> bool {
        is_nil(value)
    }
}

/// MessagePack via `rmp-serde`. Structs are written as maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MsgPackCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for MsgPackCodec {
    fn marshal(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    fn is_nil(&self, value: &T) -> bool {
        is_nil(value)
    }
}

/// TOML text. The top-level value must serialize as a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TomlCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for TomlCodec {
    fn marshal(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(toml::to_string(value)?.into_bytes())
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(toml::from_str(std::str::from_utf8(bytes)?)?)
    }

    fn is_nil(&self, value: &T) -> bool {
        is_nil(value)
    }
}

/// Protobuf binary via `prost`.
///
/// Only implemented for protobuf messages, so handing it any other type
/// fails to compile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtobufCodec;

impl<T: prost::Message + Default> Codec<T> for ProtobufCodec {
    fn marshal(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(value.encode_to_vec())
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(T::decode(bytes)?)
    }
}

/// A serde codec chosen at runtime, e.g. from a config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// [JsonCodec]
    #[default]
    Json,
    /// [BincodeCodec]
    #[serde(alias = "gob")]
    Bincode,
    /// [MsgPackCodec]
    #[clap(name = "msgpack")]
    MsgPack,
    /// [TomlCodec]
    Toml,
}

impl<T: Serialize + DeserializeOwned> Codec<T> for Encoding {
    fn marshal(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            Encoding::Json => JsonCodec.marshal(value),
            Encoding::Bincode => BincodeCodec.marshal(value),
            Encoding::MsgPack => MsgPackCodec.marshal(value),
            Encoding::Toml => TomlCodec.marshal(value),
        }
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            Encoding::Json => JsonCodec.unmarshal(bytes),
            Encoding::Bincode => BincodeCodec.unmarshal(bytes),
            Encoding::MsgPack => MsgPackCodec.unmarshal(bytes),
            Encoding::Toml => TomlCodec.unmarshal(bytes),
        }
    }

    fn is_nil(&self, value: &T) -> bool {
        is_nil(value)
    }
}

macro_rules! impl_format {
    ($codec:ty, $name:literal, $ext:literal) => {
        impl Format for $codec {
            fn name(&self) -> &'static str {
                $name
            }

            fn extension(&self) -> &'static str {
                $ext
            }
        }
    };
}

impl_format!(JsonCodec, "json", ".json");
impl_format!(BincodeCodec, "bincode", ".bin");
impl_format!(MsgPackCodec, "msgpack", ".msgpack");
impl_format!(TomlCodec, "toml", ".toml");
impl_format!(ProtobufCodec, "protobuf", ".pb");

impl Format for Encoding {
    fn name(&self) -> &'static str {
        match self {
            Encoding::Json => JsonCodec.name(),
            Encoding::Bincode => BincodeCodec.name(),
            Encoding::MsgPack => MsgPackCodec.name(),
            Encoding::Toml => TomlCodec.name(),
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Encoding::Json => JsonCodec.extension(),
            Encoding::Bincode => BincodeCodec.extension(),
            Encoding::MsgPack => MsgPackCodec.extension(),
            Encoding::Toml => TomlCodec.extension(),
        }
    }
}
