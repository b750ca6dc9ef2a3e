//! Detects values that serialize as "nothing".
//!
//! A value is nil when its top-level `Serialize` impl calls
//! `serialize_none` or `serialize_unit`, which is the case for
//! `Option::None` and `()`. Newtype wrappers are looked through.
//! The probe stops at the first call, so it never walks the value.

use std::fmt;

use serde::ser::{self, Impossible, Serialize, Serializer};

/// Returns `true` if `value` serializes as `none` or `unit`.
pub fn is_nil<T: Serialize + ?Sized>(value: &T) -> bool {
    value.serialize(NilProbe).unwrap_or(false)
}

struct NilProbe;

/// Raised for compound values, which are never nil.
#[derive(Debug)]
struct Compound;

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("compound value")
    }
}

impl std::error::Error for Compound {}

impl ser::Error for Compound {
    fn custom<T: fmt::Display>(_msg: T) -> Self {
        Compound
    }
}

macro_rules! scalar {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method(self, _v: $ty) -> Result<bool, Compound> {
                Ok(false)
            }
        )*
    };
}

impl Serializer for NilProbe {
    type Ok = bool;
    type Error = Compound;
    type SerializeSeq = Impossible<bool, Compound>;
    type SerializeTuple = Impossible<bool, Compound>;
    type SerializeTupleStruct = Impossible<bool, Compound>;
    type SerializeTupleVariant = Impossible<bool, Compound>;
    type SerializeMap = Impossible<bool, Compound>;
    type SerializeStruct = Impossible<bool, Compound>;
    type SerializeStructVariant = Impossible<bool, Compound>;

    scalar!(
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_f32(f32),
        serialize_f64(f64),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
    );

    fn serialize_none(self) -> Result<bool, Compound> {
        Ok(true)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, _value: &T) -> Result<bool, Compound> {
        Ok(false)
    }

    fn serialize_unit(self) -> Result<bool, Compound> {
        Ok(true)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<bool, Compound> {
        Ok(false)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<bool, Compound> {
        Ok(false)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<bool, Compound> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<bool, Compound> {
        Ok(false)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Compound> {
        Err(Compound)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Compound> {
        Err(Compound)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Compound> {
        Err(Compound)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Compound> {
        Err(Compound)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Compound> {
        Err(Compound)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Compound> {
        Err(Compound)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Compound> {
        Err(Compound)
    }
}
