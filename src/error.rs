use thiserror::Error;

/// Error type for anykv.
#[derive(Error, Debug)]
pub enum KvError {
    /// The key is empty.
    #[error("The key is invalid: it must not be empty")]
    InvalidKey,
    /// The value encodes as nothing (`None` or `()`).
    #[error("The value is invalid: it must not be nil")]
    InvalidValue,
    /// The value could not be marshalled by the codec.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The key exists but its stored bytes could not be unmarshalled.
    #[error("Unable to unmarshal the value of key {key:?}")]
    Unmarshal {
        /// Key that was found
        key: String,
        /// Codec failure
        source: CodecError,
    },
    /// IO error
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Error of the sled database.
    #[error(transparent)]
    Sled(#[from] sled::Error),
    /// Serialization or deserialization error of the bitcask log.
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// Error returned by the S3 client.
    #[cfg(feature = "s3")]
    #[error("{0}")]
    S3(Box<dyn std::error::Error + Send + Sync>),
    /// The config file could not be parsed.
    #[error("Invalid config")]
    Config(#[from] toml::de::Error),
    /// Unexpected command type error.
    /// It indicated a corrupted log or a program bug.
    #[error("Unexpected command type")]
    UnknownCommand,
}

impl KvError {
    /// Returns `true` if the error was raised after the key had been found.
    ///
    /// A failed `get` may still mean the key exists: the record was read
    /// but could not be decoded into the requested type.
    pub fn key_found(&self) -> bool {
        matches!(self, KvError::Unmarshal { .. })
    }
}

/// Marshal or unmarshal failure of a codec.
///
/// The message names the codec; the underlying error is the `source`.
#[derive(Error, Debug)]
pub enum CodecError {
    /// JSON
    #[error("json codec failed")]
    Json(#[from] serde_json::Error),
    /// bincode
    #[error("bincode codec failed")]
    Bincode(#[from] bincode::Error),
    /// MessagePack encoding
    #[error("msgpack encoding failed")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),
    /// MessagePack decoding
    #[error("msgpack decoding failed")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
    /// TOML encoding
    #[error("toml encoding failed")]
    TomlEncode(#[from] toml::ser::Error),
    /// TOML decoding
    #[error("toml decoding failed")]
    TomlDecode(#[from] toml::de::Error),
    /// Stored TOML is not valid UTF-8
    #[error("stored toml is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    /// Protobuf decoding
    #[error("protobuf decoding failed")]
    ProtobufDecode(#[from] prost::DecodeError),
}

/// Custom result type for KvError
pub type Result<T> = std::result::Result<T, KvError>;
