//! Schema-driven FlatBuffer decoder
//!
//! # Wire layout
//!
//! ```text
//! table:   [soffset: i32]  [inline fields...]
//!              |
//!              +--> vtable at (table - soffset):
//!                   [vtable size: u16] [object size: u16] [slot 0: u16] [slot 1: u16] ...
//!
//! slot i lives at vtable + 4 + 2*i; a slot beyond the vtable size or equal
//! to 0 means "field absent", otherwise the field starts at table + slot.
//!
//! string / bytes / vector / sub-table fields hold a u32 offset relative to
//! the field position; strings and byte runs are [len: u32][bytes], vectors
//! are [count: u32][elements], with one relative u32 per element for strings
//! and tables.
//! ```
//!
//! Decoding is pure: the same `(buffer, root, schema)` always produces an
//! equal [`Record`], and any failure discards the partially built record.
//!
//! # Output budget
//!
//! Several offsets may point at the same sub-table, string or vector, so a
//! small buffer can describe an exponentially large tree. Every decoded value
//! is charged its wire width (4 bytes for a table or vector header, `4 + len`
//! for a string or byte run, the scalar width for scalars, 1 for a struct
//! header) and decoding fails with [`DecodeError::OutputTooLarge`] once the
//! total passes the budget. Unless set with [`Decoder::with_max_output`], the
//! budget is [`DEFAULT_EXPANSION`] times the buffer length, and never less
//! than [`MIN_OUTPUT_BUDGET`].

use super::error::{DecodeError, DecodeResult};
use super::registry::SchemaRegistry;
use super::schema::{ElementType, FieldType, ScalarKind, Schema, SchemaId, StructSchema, TableSchema};
use super::value::{Record, Value};
use crate::cursor::{ByteReader, OutOfBounds};
use tracing::trace;

/// Default bound on record nesting
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default output budget as a multiple of the input length
pub const DEFAULT_EXPANSION: usize = 16;

/// Smallest default output budget in bytes
pub const MIN_OUTPUT_BUDGET: usize = 64 * 1024;

/// Decodes records from buffers using a borrowed [`SchemaRegistry`]
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'r> {
    registry: &'r SchemaRegistry,
    max_depth: usize,
    max_output: Option<usize>,
}

/// Remaining output allowance for one decode
#[derive(Debug)]
struct Budget {
    remaining: usize,
    limit: usize,
}

impl Budget {
    const fn new(limit: usize) -> Self {
        Self {
            remaining: limit,
            limit,
        }
    }

    fn charge(&mut self, amount: usize) -> DecodeResult<()> {
        self.remaining = self
            .remaining
            .checked_sub(amount)
            .ok_or(DecodeError::OutputTooLarge { limit: self.limit })?;
        Ok(())
    }
}

impl<'r> Decoder<'r> {
    /// Create a decoder with the default depth limit and output budget
    pub const fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
            max_output: None,
        }
    }

    /// Override the nesting limit
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Fix the output budget at `bytes` regardless of the buffer length
    #[must_use]
    pub const fn with_max_output(mut self, bytes: usize) -> Self {
        self.max_output = Some(bytes);
        self
    }

    /// Registry this decoder reads layouts from
    pub const fn registry(&self) -> &'r SchemaRegistry {
        self.registry
    }

    /// Output budget applied to a buffer of `len` bytes
    pub fn output_budget(&self, len: usize) -> usize {
        self.max_output
            .unwrap_or_else(|| len.saturating_mul(DEFAULT_EXPANSION).max(MIN_OUTPUT_BUDGET))
    }

    /// Decode the record of type `schema` located at `root`
    ///
    /// For a table `root` is the table position (where its vtable offset is
    /// stored); for a struct it is the first byte of the struct.
    pub fn decode(&self, buf: &[u8], root: usize, schema: SchemaId) -> DecodeResult<Record> {
        let reader = ByteReader::new(buf);
        let mut budget = Budget::new(self.output_budget(buf.len()));
        match self.registry.lookup(schema)? {
            Schema::Struct(layout) => self.read_struct(&reader, root, schema, layout, 1, &mut budget),
            Schema::Table(layout) => self.read_table(&reader, root, schema, layout, 1, &mut budget),
        }
    }

    /// Decode a whole FlatBuffer whose root table offset is stored at byte 0
    pub fn decode_root(&self, buf: &[u8], schema: SchemaId) -> DecodeResult<Record> {
        let root = ByteReader::new(buf).read_u32(0)? as usize;
        trace!("decoding {} root at {:#x} ({} bytes)", schema, root, buf.len());
        self.decode(buf, root, schema)
    }

    fn enter(&self, depth: usize) -> DecodeResult<()> {
        if depth > self.max_depth {
            return Err(DecodeError::SchemaTooDeep {
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn read_struct(
        &self,
        reader: &ByteReader<'_>,
        pos: usize,
        id: SchemaId,
        layout: &StructSchema,
        depth: usize,
        budget: &mut Budget,
    ) -> DecodeResult<Record> {
        self.enter(depth)?;
        budget.charge(1)?;
        reader.check(pos, layout.size)?;

        let mut record = Record::new(id);
        for field in &layout.fields {
            let field_pos = pos + field.offset;
            let value = match field.ty {
                FieldType::Scalar(kind) => read_scalar(reader, field_pos, kind, budget)?,
                FieldType::Struct(nested) => {
                    let nested_layout = self.registry.struct_schema(nested)?;
                    Value::Record(self.read_struct(reader, field_pos, nested, nested_layout, depth + 1, budget)?)
                }
                other => return Err(DecodeError::mismatch(field.name, other.describe())),
            };
            record.set(field.name, value);
        }
        Ok(record)
    }

    fn read_table(
        &self,
        reader: &ByteReader<'_>,
        table_pos: usize,
        id: SchemaId,
        layout: &TableSchema,
        depth: usize,
        budget: &mut Budget,
    ) -> DecodeResult<Record> {
        self.enter(depth)?;
        budget.charge(4)?;

        let soffset = reader.read_i32(table_pos)?;
        let vtable = i64::try_from(table_pos)
            .ok()
            .and_then(|pos| pos.checked_sub(i64::from(soffset)))
            .and_then(|pos| usize::try_from(pos).ok())
            .ok_or(DecodeError::BadOffset {
                position: table_pos,
                relative: i64::from(soffset),
            })?;
        let vtable_size = reader.read_u16(vtable)? as usize;

        let mut record = Record::new(id);
        for field in &layout.fields {
            let slot = field.vtable_slot();
            if slot >= vtable_size {
                continue;
            }
            let relative = reader.read_u16(vtable + slot)?;
            if relative == 0 {
                continue;
            }
            let field_pos = table_pos + relative as usize;
            let value = self.read_field(reader, field_pos, field.ty, depth, budget)?;
            record.set(field.name, value);
        }
        Ok(record)
    }

    fn read_field(
        &self,
        reader: &ByteReader<'_>,
        pos: usize,
        ty: FieldType,
        depth: usize,
        budget: &mut Budget,
    ) -> DecodeResult<Value> {
        match ty {
            FieldType::Scalar(kind) => read_scalar(reader, pos, kind, budget),
            FieldType::String => read_string(reader, follow(reader, pos)?, budget).map(Value::String),
            FieldType::Bytes => {
                let target = follow(reader, pos)?;
                let len = reader.read_u32(target)? as usize;
                let bytes = reader.read_bytes(target + 4, len)?;
                budget.charge(len + 4)?;
                Ok(Value::Bytes(bytes.to_vec()))
            }
            FieldType::Struct(id) => {
                let layout = self.registry.struct_schema(id)?;
                self.read_struct(reader, pos, id, layout, depth + 1, budget)
                    .map(Value::Record)
            }
            FieldType::Table(id) => {
                let layout = self.registry.table_schema(id)?;
                let target = follow(reader, pos)?;
                self.read_table(reader, target, id, layout, depth + 1, budget)
                    .map(Value::Record)
            }
            FieldType::Vector(element) => {
                self.read_vector(reader, follow(reader, pos)?, element, depth, budget)
            }
        }
    }

    fn read_vector(
        &self,
        reader: &ByteReader<'_>,
        pos: usize,
        element: ElementType,
        depth: usize,
        budget: &mut Budget,
    ) -> DecodeResult<Value> {
        budget.charge(4)?;
        let count = reader.read_u32(pos)? as usize;
        let data = pos + 4;

        let stride = match element {
            ElementType::Scalar(kind) => kind.width(),
            ElementType::String | ElementType::Table(_) => 4,
            ElementType::Struct(id) => self.registry.struct_schema(id)?.size,
        };
        // Zero-sized structs still cost one byte per element against the
        // bounds check, so a forged count cannot force a huge allocation.
        let span = count.checked_mul(stride.max(1)).ok_or(OutOfBounds {
            offset: data as u64,
            len: u64::MAX,
            size: reader.len(),
        })?;
        reader.check(data, span)?;

        let mut items = Vec::with_capacity(count);
        for i in 0..count {
            let elem_pos = data + i * stride;
            let item = match element {
                ElementType::Scalar(kind) => read_scalar(reader, elem_pos, kind, budget)?,
                ElementType::String => Value::String(read_string(reader, follow(reader, elem_pos)?, budget)?),
                ElementType::Struct(id) => {
                    let layout = self.registry.struct_schema(id)?;
                    Value::Record(self.read_struct(reader, elem_pos, id, layout, depth + 1, budget)?)
                }
                ElementType::Table(id) => {
                    let layout = self.registry.table_schema(id)?;
                    let target = follow(reader, elem_pos)?;
                    Value::Record(self.read_table(reader, target, id, layout, depth + 1, budget)?)
                }
            };
            items.push(item);
        }
        Ok(Value::Vector(items))
    }
}

/// Resolve the relative `u32` offset stored at `pos`
///
/// Offsets are unsigned and only point forward, as in the FlatBuffers
/// `uoffset_t`; the sign bit is part of the distance, not a direction.
fn follow(reader: &ByteReader<'_>, pos: usize) -> DecodeResult<usize> {
    let relative = reader.read_u32(pos)?;
    pos.checked_add(relative as usize)
        .ok_or(DecodeError::BadOffset {
            position: pos,
            relative: i64::from(relative),
        })
}

fn read_string(reader: &ByteReader<'_>, pos: usize, budget: &mut Budget) -> DecodeResult<String> {
    let len = reader.read_u32(pos)? as usize;
    let bytes = reader.read_bytes(pos + 4, len)?;
    budget.charge(len + 4)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn read_scalar(
    reader: &ByteReader<'_>,
    pos: usize,
    kind: ScalarKind,
    budget: &mut Budget,
) -> DecodeResult<Value> {
    budget.charge(kind.width())?;
    let value = match kind {
        ScalarKind::Bool => Value::Bool(reader.read_u8(pos)? != 0),
        ScalarKind::I8 => Value::I8(reader.read_i8(pos)?),
        ScalarKind::U8 => Value::U8(reader.read_u8(pos)?),
        ScalarKind::I16 => Value::I16(reader.read_i16(pos)?),
        ScalarKind::U16 => Value::U16(reader.read_u16(pos)?),
        ScalarKind::I32 => Value::I32(reader.read_i32(pos)?),
        ScalarKind::U32 => Value::U32(reader.read_u32(pos)?),
        ScalarKind::I64 => Value::I64(reader.read_i64(pos)?),
        ScalarKind::U64 => Value::U64(reader.read_u64(pos)?),
        ScalarKind::F32 => Value::F32(reader.read_f32(pos)?),
        ScalarKind::F64 => Value::F64(reader.read_f64(pos)?),
    };
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::flatbuffer::schema::TableField;

    const ITEM: SchemaId = SchemaId::new("Item");
    const VEC3: SchemaId = SchemaId::new("Vec3");
    const NODE: SchemaId = SchemaId::new("Node");

    fn registry() -> SchemaRegistry {
        let mut builder = SchemaRegistry::builder();
        builder
            .register_struct(
                VEC3,
                12,
                &[
                    ("X", FieldType::Scalar(ScalarKind::F32)),
                    ("Y", FieldType::Scalar(ScalarKind::F32)),
                    ("Z", FieldType::Scalar(ScalarKind::F32)),
                ],
            )
            .unwrap()
            .register_table(
                ITEM,
                &[
                    TableField::new("Id", 0, FieldType::Scalar(ScalarKind::U32)),
                    TableField::new("Name", 1, FieldType::String),
                    TableField::new("Pos", 2, FieldType::Struct(VEC3)),
                    TableField::new("Late", 5, FieldType::Scalar(ScalarKind::U8)),
                ],
            )
            .unwrap()
            .register_table(
                NODE,
                &[
                    TableField::new("Child", 0, FieldType::Table(NODE)),
                    TableField::new("Tag", 1, FieldType::Scalar(ScalarKind::U16)),
                ],
            )
            .unwrap();
        builder.build()
    }

    /// Hand-assembled table: Id=42 (slot 0), Name="ab" (slot 1), Pos absent
    /// (slot 2 = 0), vtable too short to contain slot 5.
    fn handmade_item() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&16u32.to_le_bytes()); // root -> table at 16
        // vtable at 4: size 10 (slots 0..=2), object size 12
        buf.extend_from_slice(&10u16.to_le_bytes());
        buf.extend_from_slice(&12u16.to_le_bytes());
        buf.extend_from_slice(&4u16.to_le_bytes()); // Id at table+4
        buf.extend_from_slice(&8u16.to_le_bytes()); // Name at table+8
        buf.extend_from_slice(&0u16.to_le_bytes()); // Pos absent
        buf.extend_from_slice(&[0, 0]);
        assert_eq!(buf.len(), 16);
        buf.extend_from_slice(&12i32.to_le_bytes()); // vtable at 16 - 12 = 4
        buf.extend_from_slice(&42u32.to_le_bytes()); // Id
        buf.extend_from_slice(&4u32.to_le_bytes()); // Name -> 24 + 4 = 28
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(b"ab");
        buf
    }

    #[test]
    fn test_decode_handmade_table() {
        let registry = registry();
        let data = handmade_item();
        let record = Decoder::new(&registry).decode_root(&data, ITEM).unwrap();

        assert_eq!(record.get_as::<u32>("Id").unwrap(), Some(42));
        assert_eq!(record.get_as::<String>("Name").unwrap().as_deref(), Some("ab"));
        assert!(!record.contains("Pos"));
        assert!(!record.contains("Late"));
    }

    #[test]
    fn test_truncated_string_fails_whole_decode() {
        let registry = registry();
        let mut data = handmade_item();
        data.truncate(data.len() - 1);

        let err = Decoder::new(&registry).decode_root(&data, ITEM).unwrap_err();
        assert!(matches!(err, DecodeError::OffsetOutOfRange(_)));
    }

    #[test]
    fn test_vtable_before_buffer() {
        let registry = registry();
        let mut data = Vec::new();
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&100i32.to_le_bytes());

        let err = Decoder::new(&registry).decode_root(&data, ITEM).unwrap_err();
        assert!(matches!(err, DecodeError::BadOffset { .. }));
    }

    #[test]
    fn test_unknown_schema() {
        let registry = registry();
        let data = handmade_item();
        let err = Decoder::new(&registry)
            .decode_root(&data, SchemaId::new("Missing"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnknownSchema(_)));
    }

    #[test]
    fn test_decode_struct_root() {
        let registry = registry();
        let mut data = Vec::new();
        for v in [1.5f32, -2.0, 0.25] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let record = Decoder::new(&registry).decode(&data, 0, VEC3).unwrap();
        assert_eq!(record.require::<f32>("X").unwrap(), 1.5);
        assert_eq!(record.require::<f32>("Y").unwrap(), -2.0);
        assert_eq!(record.require::<f32>("Z").unwrap(), 0.25);

        assert!(Decoder::new(&registry).decode(&data, 4, VEC3).is_err());
    }

    /// A chain of `depth` nested `Node` tables, each the child of the previous.
    fn node_chain(depth: usize) -> Vec<u8> {
        // Every node: vtable (size 6, obj 8, slot0 = 4) then table [soffset][child offset]
        let mut buf = vec![0u8; 4];
        let mut child_slots = Vec::new();
        for i in 0..depth {
            let vtable = buf.len();
            buf.extend_from_slice(&6u16.to_le_bytes());
            buf.extend_from_slice(&8u16.to_le_bytes());
            let has_child = i + 1 < depth;
            buf.extend_from_slice(&(if has_child { 4u16 } else { 0 }).to_le_bytes());
            buf.extend_from_slice(&[0, 0]);
            let table = buf.len();
            buf.extend_from_slice(&((table - vtable) as i32).to_le_bytes());
            let slot = buf.len();
            buf.extend_from_slice(&0u32.to_le_bytes());
            if i == 0 {
                buf[0..4].copy_from_slice(&(table as u32).to_le_bytes());
            }
            if let Some(prev) = child_slots.pop() {
                let rel = (table - prev) as u32;
                buf[prev..prev + 4].copy_from_slice(&rel.to_le_bytes());
            }
            if has_child {
                child_slots.push(slot);
            }
        }
        buf
    }

    #[test]
    fn test_depth_limit() {
        let registry = registry();
        let data = node_chain(10);

        assert!(Decoder::new(&registry).decode_root(&data, NODE).is_ok());
        let err = Decoder::new(&registry)
            .with_max_depth(5)
            .decode_root(&data, NODE)
            .unwrap_err();
        assert!(matches!(err, DecodeError::SchemaTooDeep { limit: 5 }));
    }

    #[test]
    fn test_forged_vector_count_rejected() {
        let mut builder = SchemaRegistry::builder();
        let list = SchemaId::new("List");
        builder
            .register_table(
                list,
                &[TableField::new(
                    "Values",
                    0,
                    FieldType::Vector(ElementType::Scalar(ScalarKind::U64)),
                )],
            )
            .unwrap();
        let registry = builder.build();

        let mut data = Vec::new();
        data.extend_from_slice(&12u32.to_le_bytes());
        data.extend_from_slice(&6u16.to_le_bytes());
        data.extend_from_slice(&8u16.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&8i32.to_le_bytes()); // table at 12
        data.extend_from_slice(&4u32.to_le_bytes()); // vector at 20
        data.extend_from_slice(&u32::MAX.to_le_bytes()); // forged count

        let err = Decoder::new(&registry).decode_root(&data, list).unwrap_err();
        assert!(err.is_corrupt_input());
    }
}
