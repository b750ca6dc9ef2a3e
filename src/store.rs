//! The storage contract every adapter honors.

use log::debug;

use crate::{encoding::Codec, Engine, KvError, Result};

/// Outcome of a lookup: the key was either found or it was not.
///
/// A missing key is a normal result, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The key exists.
    Hit(T),
    /// The key does not exist.
    Miss,
}

impl<T> Lookup<T> {
    /// Returns `true` if the key was found.
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }

    /// Converts into an `Option`, mapping `Miss` to `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss => None,
        }
    }

    /// Maps the found value with `f`, keeping `Miss` as is.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Lookup<U> {
        match self {
            Lookup::Hit(value) => Lookup::Hit(f(value)),
            Lookup::Miss => Lookup::Miss,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(value) => Lookup::Hit(value),
            None => Lookup::Miss,
        }
    }
}

/// Defines the storage interface application code depends on.
///
/// Values of any type the store's codec supports can be written and read.
pub trait Store {
    /// Codec the store marshals values with.
    type Codec;

    /// Set the value of a key.
    ///
    /// If the key already exists, the previous value will be overwritten.
    ///
    /// ## Errors
    ///
    /// `KvError::InvalidKey` if the key is empty, `KvError::InvalidValue` if
    /// the value is nil, `KvError::Codec` if the value cannot be marshalled.
    fn set<T>(&self, key: &str, value: &T) -> Result<()>
    where
        Self::Codec: Codec<T>;

    /// Get the value of a key.
    ///
    /// Returns `Lookup::Miss` if the key does not exist.
    ///
    /// ## Errors
    ///
    /// `KvError::Unmarshal` if the key exists but its value cannot be
    /// decoded as a `T`. The key was found in that case.
    fn get<T>(&self, key: &str) -> Result<Lookup<T>>
    where
        Self::Codec: Codec<T>;

    /// Get the value of a key into `out`.
    ///
    /// Returns whether the key was found; `out` is left untouched otherwise.
    fn get_into<T>(&self, key: &str, out: &mut T) -> Result<bool>
    where
        Self::Codec: Codec<T>,
    {
        match self.get(key)? {
            Lookup::Hit(value) => {
                *out = value;
                Ok(true)
            }
            Lookup::Miss => Ok(false),
        }
    }

    /// Remove a key. Removing a missing key succeeds.
    fn delete(&self, key: &str) -> Result<()>;

    /// Release the underlying engine.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Rejects empty keys.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        Err(KvError::InvalidKey)
    } else {
        Ok(())
    }
}

/// A [Store] pairing one engine with one codec.
///
/// Keys are validated and values marshalled here, so engines only ever
/// see non-empty keys and encoded bytes.
#[derive(Debug, Clone)]
pub struct Adapter<E, C> {
    engine: E,
    codec: C,
}

impl<E: Engine, C> Adapter<E, C> {
    /// Creates an `Adapter` from an opened engine and a codec.
    pub fn new(engine: E, codec: C) -> Self {
        Adapter { engine, codec }
    }

    /// Direct access to the wrapped engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The codec values are marshalled with.
    pub fn codec(&self) -> &C {
        &self.codec
    }
}

impl<E: Engine, C> Store for Adapter<E, C> {
    type Codec = C;

    fn set<T>(&self, key: &str, value: &T) -> Result<()>
    where
        C: Codec<T>,
    {
        validate_key(key)?;
        if self.codec.is_nil(value) {
            return Err(KvError::InvalidValue);
        }
        let bytes = self.codec.marshal(value)?;
        self.engine.put(key, bytes)
    }

    fn get<T>(&self, key: &str) -> Result<Lookup<T>>
    where
        C: Codec<T>,
    {
        validate_key(key)?;
        match self.engine.get(key)? {
            Lookup::Hit(bytes) => self
                .codec
                .unmarshal(&bytes)
                .map(Lookup::Hit)
                .map_err(|source| KvError::Unmarshal {
                    key: key.to_owned(),
                    source,
                }),
            Lookup::Miss => Ok(Lookup::Miss),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.engine.delete(key)
    }

    fn close(self) -> Result<()> {
        debug!("Closing store");
        self.engine.close()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{JsonCodec, MemoryEngine};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Foo {
        bar: String,
    }

    fn store() -> Adapter<MemoryEngine, JsonCodec> {
        Adapter::new(MemoryEngine::default(), JsonCodec)
    }

    #[test]
    fn validate_key_rejects_empty() {
        assert!(matches!(validate_key(""), Err(KvError::InvalidKey)));
        assert!(validate_key(" ").is_ok());
    }

    #[test]
    fn nil_value_is_rejected_before_engine() {
        let store = store();
        let res = store.set("foo", &None::<Foo>);
        assert!(matches!(res, Err(KvError::InvalidValue)));
        assert!(store.engine().is_empty());
    }

    #[test]
    fn get_into_leaves_out_untouched_on_miss() -> Result<()> {
        let store = store();
        let mut out = Foo { bar: "old".into() };
        assert!(!store.get_into("foo", &mut out)?);
        assert_eq!(out.bar, "old");

        store.set("foo", &Foo { bar: "baz".into() })?;
        assert!(store.get_into("foo", &mut out)?);
        assert_eq!(out.bar, "baz");
        Ok(())
    }

    #[test]
    fn undecodable_value_reports_found() -> Result<()> {
        let store = store();
        store.set("foo", &vec![1, 2, 3])?;

        let err = store.get::<Foo>("foo").unwrap_err();
        assert!(err.key_found());
        assert!(matches!(err, KvError::Unmarshal { ref key, .. } if key == "foo"));
        Ok(())
    }

    #[test]
    fn lookup_helpers() {
        let hit: Lookup<u8> = Some(3).into();
        assert!(hit.is_hit());
        assert_eq!(hit.map(|v| v * 2).into_option(), Some(6));
        assert_eq!(Lookup::<u8>::from(None), Lookup::Miss);
    }
}
