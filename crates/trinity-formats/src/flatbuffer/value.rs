//! Decoded record representation

use super::error::{DecodeError, DecodeResult};
use super::schema::SchemaId;
use std::collections::BTreeMap;

/// A decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean scalar
    Bool(bool),
    /// Signed 8-bit scalar
    I8(i8),
    /// Unsigned 8-bit scalar
    U8(u8),
    /// Signed 16-bit scalar
    I16(i16),
    /// Unsigned 16-bit scalar
    U16(u16),
    /// Signed 32-bit scalar
    I32(i32),
    /// Unsigned 32-bit scalar
    U32(u32),
    /// Signed 64-bit scalar
    I64(i64),
    /// Unsigned 64-bit scalar
    U64(u64),
    /// Single precision float
    F32(f32),
    /// Double precision float
    F64(f64),
    /// Length-prefixed string
    String(String),
    /// Length-prefixed byte run
    Bytes(Vec<u8>),
    /// Nested struct or table
    Record(Record),
    /// Vector of any element type
    Vector(Vec<Value>),
}

impl Value {
    /// Short type name, used in mismatch errors
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::I8(_) => "i8",
            Self::U8(_) => "u8",
            Self::I16(_) => "i16",
            Self::U16(_) => "u16",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Record(_) => "record",
            Self::Vector(_) => "vector",
        }
    }
}

/// A decoded struct or table
///
/// Absent table fields have no entry, so "field absent" and "field present
/// with default value" stay distinguishable.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: SchemaId,
    fields: BTreeMap<&'static str, Value>,
}

impl Record {
    /// Empty record of the given schema
    pub const fn new(schema: SchemaId) -> Self {
        Self {
            schema,
            fields: BTreeMap::new(),
        }
    }

    /// Schema this record was decoded with
    pub const fn schema(&self) -> SchemaId {
        self.schema
    }

    /// Set a field, replacing any previous value
    pub fn set(&mut self, name: &'static str, value: impl Into<Value>) {
        self.fields.insert(name, value.into());
    }

    /// Builder-style [`Record::set`]
    #[must_use]
    pub fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Raw field value, if present
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Whether the field is present
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of present fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is present
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over present fields in name order
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.fields.iter().map(|(name, value)| (*name, value))
    }

    /// Typed field value; `Ok(None)` when absent
    pub fn get_as<T: FromValue>(&self, name: &str) -> DecodeResult<Option<T>> {
        self.get(name)
            .map(|value| T::from_value(value).ok_or_else(|| mismatch::<T>(name, value)))
            .transpose()
    }

    /// Typed field value, falling back to `T::default()` when absent
    pub fn get_or_default<T: FromValue + Default>(&self, name: &str) -> DecodeResult<T> {
        Ok(self.get_as(name)?.unwrap_or_default())
    }

    /// Typed field value that must be present
    pub fn require<T: FromValue>(&self, name: &'static str) -> DecodeResult<T> {
        self.get_as(name)?.ok_or(DecodeError::MissingField {
            schema: self.schema,
            field: name,
        })
    }

    /// Elements of a vector field; an absent vector is empty
    pub fn vec_of<T: FromValue>(&self, name: &str) -> DecodeResult<Vec<T>> {
        match self.get(name) {
            None => Ok(Vec::new()),
            Some(Value::Vector(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    T::from_value(item).ok_or_else(|| mismatch::<T>(&format!("{name}[{i}]"), item))
                })
                .collect(),
            Some(other) => Err(DecodeError::mismatch(name, format!("vector, found {}", other.type_name()))),
        }
    }
}

fn mismatch<T: FromValue>(name: &str, found: &Value) -> DecodeError {
    DecodeError::mismatch(name, format!("{}, found {}", T::EXPECTED, found.type_name()))
}

/// Conversion from a decoded [`Value`] into a Rust type
pub trait FromValue: Sized {
    /// Name of the expected value kind, for error messages
    const EXPECTED: &'static str;

    /// Convert, or `None` if the value has a different kind
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! scalar_value {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl FromValue for $ty {
                const EXPECTED: &'static str = stringify!($ty);

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(*v),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

scalar_value! {
    Bool => bool,
    I8 => i8,
    U8 => u8,
    I16 => i16,
    U16 => u16,
    I32 => i32,
    U32 => u32,
    I64 => i64,
    U64 => u64,
    F32 => f32,
    F64 => f64,
}

impl FromValue for String {
    const EXPECTED: &'static str = "string";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromValue for Vec<u8> {
    const EXPECTED: &'static str = "bytes";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bytes(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }
}

impl FromValue for Record {
    const EXPECTED: &'static str = "record";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Record(record) => Some(record.clone()),
            _ => None,
        }
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Self::Record(v)
    }
}

macro_rules! vector_value {
    ($($ty:ty),*) => {
        $(
            impl From<Vec<$ty>> for Value {
                fn from(items: Vec<$ty>) -> Self {
                    Self::Vector(items.into_iter().map(Self::from).collect())
                }
            }
        )*
    };
}

// `Vec<u8>` is deliberately absent: it maps to `Value::Bytes`.
vector_value!(bool, i8, i16, u16, i32, u32, i64, u64, f32, f64, String, Record);

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::Vector(items)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    const INFO: SchemaId = SchemaId::new("Info");

    #[test]
    fn test_typed_access() {
        let record = Record::new(INFO)
            .with("Index", 7u64)
            .with("Name", "pack")
            .with("Hashes", vec![1u64, 2, 3]);

        assert_eq!(record.get_as::<u64>("Index").unwrap(), Some(7));
        assert_eq!(record.get_as::<u64>("Missing").unwrap(), None);
        assert_eq!(record.require::<String>("Name").unwrap(), "pack");
        assert_eq!(record.vec_of::<u64>("Hashes").unwrap(), vec![1, 2, 3]);
        assert!(record.vec_of::<u64>("Absent").unwrap().is_empty());
        assert_eq!(record.get_or_default::<u32>("Absent").unwrap(), 0);
    }

    #[test]
    fn test_type_mismatch() {
        let record = Record::new(INFO).with("Index", 7u32);
        assert!(matches!(
            record.get_as::<u64>("Index"),
            Err(DecodeError::TypeMismatch { .. })
        ));
        assert!(matches!(
            record.vec_of::<u64>("Index"),
            Err(DecodeError::TypeMismatch { .. })
        ));
        assert!(matches!(
            record.require::<u64>("Other"),
            Err(DecodeError::MissingField { field: "Other", .. })
        ));
    }

    #[test]
    fn test_bytes_stay_bytes() {
        let value = Value::from(vec![1u8, 2, 3]);
        assert_eq!(value, Value::Bytes(vec![1, 2, 3]));
        let value = Value::from(vec![1u16, 2]);
        assert_eq!(value, Value::Vector(vec![Value::U16(1), Value::U16(2)]));
    }
}
