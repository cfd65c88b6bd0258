//! Schema-driven FlatBuffer records
//!
//! Trinity resource files are FlatBuffers without any embedded type
//! information. Layouts are registered once in a [`SchemaRegistry`] and a
//! [`Decoder`] walks a buffer against them, producing a generic [`Record`].
//! Typed views ([`TableRecord`]) convert records into plain Rust structs.
//!
//! # Example
//!
//! ```
//! use trinity_formats::flatbuffer::{Decoder, Encoder, Record, SchemaRegistry, ids};
//!
//! let registry = SchemaRegistry::trinity()?;
//! let info = Record::new(ids::PACK_INFO)
//!     .with("FileSize", 4096u64)
//!     .with("FileCount", 3u64);
//!
//! let bytes = Encoder::new(&registry).encode_root(&info)?;
//! let decoded = Decoder::new(&registry).decode_root(&bytes, ids::PACK_INFO)?;
//! assert_eq!(decoded.get_as::<u64>("FileCount")?, Some(3));
//! # Ok::<(), trinity_formats::flatbuffer::DecodeError>(())
//! ```

mod decoder;
mod encoder;
mod error;
mod registry;
mod schema;
mod schemas;
mod value;

pub use decoder::{DEFAULT_EXPANSION, DEFAULT_MAX_DEPTH, Decoder, MIN_OUTPUT_BUDGET};
pub use encoder::Encoder;
pub use error::{DecodeError, DecodeResult};
pub use registry::{SchemaRegistry, SchemaRegistryBuilder};
pub use schema::{
    ElementType, FieldType, ScalarKind, Schema, SchemaId, StructField, StructSchema, TableField,
    TableSchema,
};
pub use schemas::{ids, register_math, register_resource_dictionary};
pub use value::{FromValue, Record, Value};

/// A Rust type backed by a registered table layout
pub trait TableRecord: Sized {
    /// Layout this type is decoded with
    const SCHEMA: SchemaId;

    /// Build from a decoded record
    fn from_record(record: &Record) -> DecodeResult<Self>;

    /// Convert back into a generic record
    fn to_record(&self) -> Record;

    /// Decode a buffer whose root is this table
    fn decode_root(registry: &SchemaRegistry, buf: &[u8]) -> DecodeResult<Self> {
        let record = Decoder::new(registry).decode_root(buf, Self::SCHEMA)?;
        Self::from_record(&record)
    }

    /// Encode as a buffer with this table as root
    fn encode_root(&self, registry: &SchemaRegistry) -> DecodeResult<Vec<u8>> {
        Encoder::new(registry).encode_root(&self.to_record())
    }
}

/// Collect `Self` from every record of a vector-of-tables field
pub(crate) fn records_of<T: TableRecord>(record: &Record, name: &str) -> DecodeResult<Vec<T>> {
    record
        .vec_of::<Record>(name)?
        .iter()
        .map(T::from_record)
        .collect()
}
