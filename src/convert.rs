//! Conversion between typed values and their raw persisted strings.
//!
//! The property layer never interprets raw strings itself; it hands them to a
//! [`TypeConverter`] together with the declared [`PropertyType`]. Typed Rust
//! values cross this boundary as [`serde_json::Value`], so any
//! `Serialize`/`DeserializeOwned` type can be stored as long as its shape
//! matches the declaration.
//!
//! # Raw format of [`TextConverter`]
//!
//! | Type | Value | Raw |
//! |------|-------|-----|
//! | `string` | `"Ann"` | `Ann` |
//! | `integer` | `42` | `42` |
//! | `float` | `1.5` | `1.5` |
//! | `bool` | `true` | `true` |
//! | `json`, `list<T>`, `map<T>` | any | compact JSON |
//! | `set<T>` | `["b", "a", "a"]` | `["a","b"]` (deduplicated, sorted) |

use crate::types::{value_kind, PropertyType};
use serde::ser::{self, Impossible, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Result of a single conversion; the error is a human readable reason that
/// the caller wraps with the property key.
pub type ConvertResult<T> = std::result::Result<T, String>;

/// Converts values to and from their raw string encoding.
///
/// Both directions must reject input whose shape does not match `ty`.
/// For every value `v` accepted by `ty`, `from_raw(to_raw(v, ty), ty)` must
/// yield a value that deserializes to the same Rust value as `v`.
pub trait TypeConverter: Send + Sync {
    /// Encode `value` declared as `ty`.
    fn to_raw(&self, value: &Value, ty: &PropertyType) -> ConvertResult<String>;

    /// Decode a raw string declared as `ty`.
    fn from_raw(&self, raw: &str, ty: &PropertyType) -> ConvertResult<Value>;
}

/// Default converter: plain text for scalars, JSON for everything else.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextConverter;

impl TextConverter {
    pub fn new() -> Self {
        TextConverter
    }

    fn mismatch(ty: &PropertyType, value: &Value) -> String {
        format!("expected {}, found {}", ty, value_kind(value))
    }

    fn encode_json(value: &Value) -> ConvertResult<String> {
        serde_json::to_string(value).map_err(|e| e.to_string())
    }

    /// Deduplicate set members and order them by their encoding so equal sets
    /// always persist identically.
    fn canonical_set(items: &[Value]) -> ConvertResult<Value> {
        let mut members = BTreeMap::new();
        for item in items {
            members.insert(Self::encode_json(item)?, item.clone());
        }
        Ok(Value::Array(members.into_values().collect()))
    }
}

impl TypeConverter for TextConverter {
    fn to_raw(&self, value: &Value, ty: &PropertyType) -> ConvertResult<String> {
        if !ty.accepts(value) {
            return Err(Self::mismatch(ty, value));
        }

        match (ty, value) {
            (PropertyType::String, Value::String(s)) => Ok(s.clone()),
            (PropertyType::Bool, Value::Bool(b)) => Ok(b.to_string()),
            (PropertyType::Integer | PropertyType::Float, Value::Number(n)) => Ok(n.to_string()),
            (PropertyType::Set(_), Value::Array(items)) => {
                Self::encode_json(&Self::canonical_set(items)?)
            }
            _ => Self::encode_json(value),
        }
    }

    fn from_raw(&self, raw: &str, ty: &PropertyType) -> ConvertResult<Value> {
        let value = match ty {
            PropertyType::String => Value::String(raw.to_string()),
            PropertyType::Bool => match raw {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                other => return Err(format!("invalid bool '{}'", other)),
            },
            PropertyType::Integer => {
                if let Ok(n) = raw.parse::<i64>() {
                    Value::from(n)
                } else if let Ok(n) = raw.parse::<u64>() {
                    Value::from(n)
                } else {
                    return Err(format!("invalid integer '{}'", raw));
                }
            }
            // Integral floats keep their integer encoding so they read back as
            // either integers or floats.
            PropertyType::Float if raw.parse::<i64>().is_ok() => {
                Value::from(raw.parse::<i64>().map_err(|e| e.to_string())?)
            }
            PropertyType::Float if raw.parse::<u64>().is_ok() => {
                Value::from(raw.parse::<u64>().map_err(|e| e.to_string())?)
            }
            PropertyType::Float => {
                let n = raw
                    .parse::<f64>()
                    .map_err(|e| format!("invalid float '{}': {}", raw, e))?;
                Number::from_f64(n)
                    .map(Value::Number)
                    .ok_or_else(|| format!("non-finite float '{}'", raw))?
            }
            _ => serde_json::from_str(raw).map_err(|e| e.to_string())?,
        };

        if ty.accepts(&value) {
            Ok(value)
        } else {
            Err(Self::mismatch(ty, &value))
        }
    }
}

/// Whether `value` serializes as an explicit absence (`None`, `()`, unit
/// structs, or a JSON null), as opposed to a value `serde_json` maps to null
/// because it cannot represent it, such as a non-finite float.
pub(crate) fn is_explicit_null<T: Serialize + ?Sized>(value: &T) -> bool {
    value.serialize(NullDetector).unwrap_or(false)
}

struct NullDetector;

#[derive(Debug)]
struct NotNull;

impl fmt::Display for NotNull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("not null")
    }
}

impl std::error::Error for NotNull {}

impl ser::Error for NotNull {
    fn custom<M: fmt::Display>(_msg: M) -> Self {
        NotNull
    }
}

macro_rules! not_null {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(fn $method(self, _v: $ty) -> Result<bool, NotNull> {
            Ok(false)
        })*
    };
}

impl ser::Serializer for NullDetector {
    type Ok = bool;
    type Error = NotNull;
    type SerializeSeq = Impossible<bool, NotNull>;
    type SerializeTuple = Impossible<bool, NotNull>;
    type SerializeTupleStruct = Impossible<bool, NotNull>;
    type SerializeTupleVariant = Impossible<bool, NotNull>;
    type SerializeMap = Impossible<bool, NotNull>;
    type SerializeStruct = Impossible<bool, NotNull>;
    type SerializeStructVariant = Impossible<bool, NotNull>;

    not_null!(
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

    fn serialize_none(self) -> Result<bool, NotNull> {
        Ok(true)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<bool, NotNull> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<bool, NotNull> {
        Ok(true)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<bool, NotNull> {
        Ok(true)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> Result<bool, NotNull> {
        Ok(false)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<bool, NotNull> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<bool, NotNull> {
        Ok(false)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, NotNull> {
        Err(NotNull)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, NotNull> {
        Err(NotNull)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, NotNull> {
        Err(NotNull)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, NotNull> {
        Err(NotNull)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, NotNull> {
        Err(NotNull)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, NotNull> {
        Err(NotNull)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, NotNull> {
        Err(NotNull)
    }
}
