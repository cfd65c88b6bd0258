//! Schema-driven FlatBuffer encoder
//!
//! Produces buffers the [`Decoder`](super::Decoder) reads back to equal
//! records. The writer works front to back: each table is preceded by its
//! vtable, and everything reached through a relative offset (strings, byte
//! runs, vectors, sub-tables) is written after the table's inline body with
//! the forward offset patched in afterwards.

use super::error::{DecodeError, DecodeResult};
use super::registry::SchemaRegistry;
use super::schema::{ElementType, FieldType, ScalarKind, Schema, SchemaId, StructSchema, TableSchema};
use super::value::{Record, Value};

/// Encodes records into FlatBuffer bytes using a borrowed [`SchemaRegistry`]
#[derive(Debug, Clone, Copy)]
pub struct Encoder<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> Encoder<'r> {
    /// Create an encoder
    pub const fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Encode `record` as a complete buffer with its root offset at byte 0
    pub fn encode_root(&self, record: &Record) -> DecodeResult<Vec<u8>> {
        let mut out = Writer::default();
        out.buf.extend_from_slice(&[0; 4]);

        let id = record.schema();
        let root = match self.registry.lookup(id)? {
            Schema::Table(layout) => self.write_table(&mut out, record, id, layout)?,
            Schema::Struct(layout) => {
                out.align(4);
                let pos = out.buf.len();
                let bytes = self.struct_bytes(record, id, layout)?;
                out.buf.extend_from_slice(&bytes);
                pos
            }
        };
        out.patch_u32(0, to_u32(root, "root")?);
        Ok(out.buf)
    }

    fn write_table(
        &self,
        out: &mut Writer,
        record: &Record,
        id: SchemaId,
        layout: &TableSchema,
    ) -> DecodeResult<usize> {
        for (name, _) in record.fields() {
            if !layout.fields.iter().any(|field| field.name == name) {
                return Err(DecodeError::mismatch(name, format!("a field of {id}")));
            }
        }

        let present: Vec<_> = layout
            .fields
            .iter()
            .filter_map(|field| record.get(field.name).map(|value| (field, value)))
            .collect();
        let slots = present
            .iter()
            .map(|(field, _)| usize::from(field.slot) + 1)
            .max()
            .unwrap_or(0);
        let vtable_len = 4 + slots * 2;

        out.align(2);
        let vtable_pos = out.buf.len();
        out.buf.extend_from_slice(&to_u16(vtable_len, id)?.to_le_bytes());
        out.buf.resize(vtable_pos + vtable_len, 0);

        out.align(4);
        let table_pos = out.buf.len();
        let soffset = i32::try_from(table_pos - vtable_pos).map_err(|_| overflow(id))?;
        out.buf.extend_from_slice(&soffset.to_le_bytes());

        let mut deferred = Vec::new();
        for &(field, value) in &present {
            let align = match field.ty {
                FieldType::Scalar(kind) => kind.width(),
                FieldType::Struct(_) => 1,
                _ => 4,
            };
            out.align(align);
            let relative = to_u16(out.buf.len() - table_pos, id)?;
            out.patch_u16(vtable_pos + field.vtable_slot(), relative);

            match field.ty {
                FieldType::Scalar(kind) => out.buf.extend_from_slice(&scalar_bytes(kind, value, field.name)?),
                FieldType::Struct(nested) => {
                    let layout = self.registry.struct_schema(nested)?;
                    let bytes = self.struct_bytes(expect_record(value, nested, field.name)?, nested, layout)?;
                    out.buf.extend_from_slice(&bytes);
                }
                ty => {
                    deferred.push((out.buf.len(), ty, field.name, value));
                    out.buf.extend_from_slice(&[0; 4]);
                }
            }
        }

        let object_size = to_u16(out.buf.len() - table_pos, id)?;
        out.patch_u16(vtable_pos + 2, object_size);

        for (slot, ty, name, value) in deferred {
            let target = self.write_indirect(out, ty, name, value)?;
            out.patch_u32(slot, to_u32(target - slot, name)?);
        }
        Ok(table_pos)
    }

    /// Write an out-of-line item and return its position
    fn write_indirect(
        &self,
        out: &mut Writer,
        ty: FieldType,
        name: &str,
        value: &Value,
    ) -> DecodeResult<usize> {
        match (ty, value) {
            (FieldType::String, Value::String(s)) => out.write_string(s, name),
            (FieldType::Bytes, Value::Bytes(bytes)) => {
                out.align(4);
                let pos = out.buf.len();
                out.buf.extend_from_slice(&to_u32(bytes.len(), name)?.to_le_bytes());
                out.buf.extend_from_slice(bytes);
                Ok(pos)
            }
            (FieldType::Table(id), value) => {
                let layout = self.registry.table_schema(id)?;
                self.write_table(out, expect_record(value, id, name)?, id, layout)
            }
            (FieldType::Vector(element), Value::Vector(items)) => self.write_vector(out, element, name, items),
            (ty, _) => Err(DecodeError::mismatch(
                name,
                format!("{}, found {}", ty.describe(), value.type_name()),
            )),
        }
    }

    fn write_vector(
        &self,
        out: &mut Writer,
        element: ElementType,
        name: &str,
        items: &[Value],
    ) -> DecodeResult<usize> {
        out.align(4);
        if let ElementType::Scalar(kind) = element {
            // keep 8-byte elements naturally aligned after the count
            if kind.width() == 8 && out.buf.len().is_multiple_of(8) {
                out.buf.extend_from_slice(&[0; 4]);
            }
        }
        let pos = out.buf.len();
        out.buf.extend_from_slice(&to_u32(items.len(), name)?.to_le_bytes());

        match element {
            ElementType::Scalar(kind) => {
                for item in items {
                    out.buf.extend_from_slice(&scalar_bytes(kind, item, name)?);
                }
            }
            ElementType::Struct(id) => {
                let layout = self.registry.struct_schema(id)?;
                for item in items {
                    let bytes = self.struct_bytes(expect_record(item, id, name)?, id, layout)?;
                    out.buf.extend_from_slice(&bytes);
                }
            }
            ElementType::String | ElementType::Table(_) => {
                let slots_start = out.buf.len();
                out.buf.resize(slots_start + items.len() * 4, 0);
                for (i, item) in items.iter().enumerate() {
                    let slot = slots_start + i * 4;
                    let target = match (element, item) {
                        (ElementType::String, Value::String(s)) => out.write_string(s, name)?,
                        (ElementType::Table(id), item) => {
                            let layout = self.registry.table_schema(id)?;
                            self.write_table(out, expect_record(item, id, name)?, id, layout)?
                        }
                        _ => return Err(DecodeError::mismatch(name, format!("string, found {}", item.type_name()))),
                    };
                    out.patch_u32(slot, to_u32(target - slot, name)?);
                }
            }
        }
        Ok(pos)
    }

    fn struct_bytes(&self, record: &Record, id: SchemaId, layout: &StructSchema) -> DecodeResult<Vec<u8>> {
        let mut bytes = vec![0; layout.size];
        for field in &layout.fields {
            let value = record.get(field.name).ok_or(DecodeError::MissingField {
                schema: id,
                field: field.name,
            })?;
            let encoded = match field.ty {
                FieldType::Scalar(kind) => scalar_bytes(kind, value, field.name)?,
                FieldType::Struct(nested) => {
                    let layout = self.registry.struct_schema(nested)?;
                    self.struct_bytes(expect_record(value, nested, field.name)?, nested, layout)?
                }
                other => return Err(DecodeError::mismatch(field.name, other.describe())),
            };
            bytes[field.offset..field.offset + encoded.len()].copy_from_slice(&encoded);
        }
        Ok(bytes)
    }
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn align(&mut self, to: usize) {
        let pad = (to - self.buf.len() % to) % to;
        self.buf.resize(self.buf.len() + pad, 0);
    }

    fn patch_u16(&mut self, pos: usize, value: u16) {
        self.buf[pos..pos + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn patch_u32(&mut self, pos: usize, value: u32) {
        self.buf[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Length-prefixed, nul-terminated string
    fn write_string(&mut self, s: &str, name: &str) -> DecodeResult<usize> {
        self.align(4);
        let pos = self.buf.len();
        self.buf.extend_from_slice(&to_u32(s.len(), name)?.to_le_bytes());
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        Ok(pos)
    }
}

fn expect_record<'v>(value: &'v Value, id: SchemaId, name: &str) -> DecodeResult<&'v Record> {
    match value {
        Value::Record(record) if record.schema() == id => Ok(record),
        Value::Record(record) => Err(DecodeError::mismatch(name, format!("{id}, found {}", record.schema()))),
        other => Err(DecodeError::mismatch(name, format!("{id}, found {}", other.type_name()))),
    }
}

fn scalar_bytes(kind: ScalarKind, value: &Value, name: &str) -> DecodeResult<Vec<u8>> {
    let bytes = match (kind, value) {
        (ScalarKind::Bool, Value::Bool(v)) => vec![u8::from(*v)],
        (ScalarKind::I8, Value::I8(v)) => v.to_le_bytes().to_vec(),
        (ScalarKind::U8, Value::U8(v)) => vec![*v],
        (ScalarKind::I16, Value::I16(v)) => v.to_le_bytes().to_vec(),
        (ScalarKind::U16, Value::U16(v)) => v.to_le_bytes().to_vec(),
        (ScalarKind::I32, Value::I32(v)) => v.to_le_bytes().to_vec(),
        (ScalarKind::U32, Value::U32(v)) => v.to_le_bytes().to_vec(),
        (ScalarKind::I64, Value::I64(v)) => v.to_le_bytes().to_vec(),
        (ScalarKind::U64, Value::U64(v)) => v.to_le_bytes().to_vec(),
        (ScalarKind::F32, Value::F32(v)) => v.to_le_bytes().to_vec(),
        (ScalarKind::F64, Value::F64(v)) => v.to_le_bytes().to_vec(),
        (kind, value) => {
            return Err(DecodeError::mismatch(
                name,
                format!("{}, found {}", kind.name(), value.type_name()),
            ));
        }
    };
    Ok(bytes)
}

fn to_u32(value: usize, name: &str) -> DecodeResult<u32> {
    u32::try_from(value).map_err(|_| DecodeError::mismatch(name, "length or offset within u32 range"))
}

fn to_u16(value: usize, id: SchemaId) -> DecodeResult<u16> {
    u16::try_from(value).map_err(|_| overflow(id))
}

fn overflow(id: SchemaId) -> DecodeError {
    DecodeError::InvalidSchema {
        id,
        reason: "inline table data exceeds the 16-bit vtable range".to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::flatbuffer::Decoder;
    use crate::flatbuffer::schema::TableField;
    use pretty_assertions::assert_eq;

    const POINT: SchemaId = SchemaId::new("Point");
    const ENTRY: SchemaId = SchemaId::new("Entry");
    const BAG: SchemaId = SchemaId::new("Bag");

    fn registry() -> SchemaRegistry {
        let mut builder = SchemaRegistry::builder();
        builder
            .register_struct(
                POINT,
                8,
                &[
                    ("X", FieldType::Scalar(ScalarKind::I32)),
                    ("Y", FieldType::Scalar(ScalarKind::I32)),
                ],
            )
            .unwrap()
            .register_table(
                ENTRY,
                &[
                    TableField::new("Key", 0, FieldType::Scalar(ScalarKind::U64)),
                    TableField::new("Label", 1, FieldType::String),
                ],
            )
            .unwrap()
            .register_table(
                BAG,
                &[
                    TableField::new("Flag", 0, FieldType::Scalar(ScalarKind::Bool)),
                    TableField::new("Origin", 1, FieldType::Struct(POINT)),
                    TableField::new("Blob", 2, FieldType::Bytes),
                    TableField::new("Tags", 3, FieldType::Vector(ElementType::String)),
                    TableField::new("Points", 4, FieldType::Vector(ElementType::Struct(POINT))),
                    TableField::new("Entries", 5, FieldType::Vector(ElementType::Table(ENTRY))),
                    TableField::new("Weights", 6, FieldType::Vector(ElementType::Scalar(ScalarKind::F64))),
                    TableField::new("Head", 9, FieldType::Table(ENTRY)),
                ],
            )
            .unwrap();
        builder.build()
    }

    fn point(x: i32, y: i32) -> Record {
        Record::new(POINT).with("X", x).with("Y", y)
    }

    fn entry(key: u64, label: &str) -> Record {
        Record::new(ENTRY).with("Key", key).with("Label", label)
    }

    #[test]
    fn test_roundtrip_every_field_kind() {
        let registry = registry();
        let bag = Record::new(BAG)
            .with("Flag", true)
            .with("Origin", point(-3, 9))
            .with("Blob", vec![0xde_u8, 0xad, 0xbe, 0xef])
            .with("Tags", vec!["a".to_string(), String::new(), "ccc".to_string()])
            .with("Points", vec![point(1, 2), point(3, 4)])
            .with("Entries", vec![entry(1, "one"), entry(2, "two")])
            .with("Weights", vec![0.5f64, -1.25])
            .with("Head", entry(u64::MAX, "head"));

        let bytes = Encoder::new(&registry).encode_root(&bag).unwrap();
        let decoded = Decoder::new(&registry).decode_root(&bytes, BAG).unwrap();
        assert_eq!(decoded, bag);
    }

    #[test]
    fn test_absent_fields_stay_absent() {
        let registry = registry();
        let bag = Record::new(BAG).with("Head", entry(5, "x"));

        let bytes = Encoder::new(&registry).encode_root(&bag).unwrap();
        let decoded = Decoder::new(&registry).decode_root(&bytes, BAG).unwrap();
        assert_eq!(decoded.len(), 1);
        assert!(!decoded.contains("Flag"));
        assert_eq!(decoded, bag);
    }

    #[test]
    fn test_empty_vector_is_present() {
        let registry = registry();
        let bag = Record::new(BAG).with("Tags", Vec::<String>::new());

        let bytes = Encoder::new(&registry).encode_root(&bag).unwrap();
        let decoded = Decoder::new(&registry).decode_root(&bytes, BAG).unwrap();
        assert_eq!(decoded.get("Tags"), Some(&Value::Vector(Vec::new())));
    }

    #[test]
    fn test_rejects_wrong_value_kind() {
        let registry = registry();
        let bag = Record::new(BAG).with("Flag", 1u32);
        assert!(matches!(
            Encoder::new(&registry).encode_root(&bag),
            Err(DecodeError::TypeMismatch { .. })
        ));

        let bag = Record::new(BAG).with("Unknown", 1u32);
        assert!(Encoder::new(&registry).encode_root(&bag).is_err());

        let bag = Record::new(BAG).with("Origin", Record::new(POINT).with("X", 1i32));
        assert!(matches!(
            Encoder::new(&registry).encode_root(&bag),
            Err(DecodeError::MissingField { field: "Y", .. })
        ));
    }

    #[test]
    fn test_string_is_nul_terminated() {
        let registry = registry();
        let bytes = Encoder::new(&registry).encode_root(&entry(0, "abc")).unwrap();
        let tail = &bytes[bytes.len() - 4..];
        assert_eq!(tail, b"abc\0");
    }
}
