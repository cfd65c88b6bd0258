//! Layout descriptions for struct and table records

use std::fmt;

/// Logical record-type identifier
///
/// Identifiers are plain names (`"PackedArchive"`, `"Vector3f"`); two
/// registries may reuse the same name for different layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(&'static str);

impl SchemaId {
    /// Create an identifier from a static name
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The identifier's name
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Fixed-width scalar kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// One byte, non-zero is `true`
    Bool,
    /// Signed 8-bit integer
    I8,
    /// Unsigned 8-bit integer
    U8,
    /// Signed 16-bit integer
    I16,
    /// Unsigned 16-bit integer
    U16,
    /// Signed 32-bit integer
    I32,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 64-bit integer
    I64,
    /// Unsigned 64-bit integer
    U64,
    /// IEEE-754 single precision
    F32,
    /// IEEE-754 double precision
    F64,
}

impl ScalarKind {
    /// Encoded width in bytes
    pub const fn width(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Short lowercase name, used in error messages
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

/// Element type of a vector field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Tightly packed scalars
    Scalar(ScalarKind),
    /// One relative offset per element, each pointing at a string
    String,
    /// Tightly packed inline structs
    Struct(SchemaId),
    /// One relative offset per element, each pointing at a table
    Table(SchemaId),
}

/// Declared type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Inline scalar
    Scalar(ScalarKind),
    /// Relative offset to a length-prefixed string
    String,
    /// Relative offset to a length-prefixed byte run
    Bytes,
    /// Inline fixed-size struct
    Struct(SchemaId),
    /// Relative offset to a nested table
    Table(SchemaId),
    /// Relative offset to a count-prefixed vector
    Vector(ElementType),
}

impl FieldType {
    /// Description used in type-mismatch errors
    pub fn describe(&self) -> String {
        match self {
            Self::Scalar(kind) => kind.name().to_string(),
            Self::String => "string".to_string(),
            Self::Bytes => "bytes".to_string(),
            Self::Struct(id) => format!("struct {id}"),
            Self::Table(id) => format!("table {id}"),
            Self::Vector(ElementType::Scalar(kind)) => format!("[{}]", kind.name()),
            Self::Vector(ElementType::String) => "[string]".to_string(),
            Self::Vector(ElementType::Struct(id)) => format!("[struct {id}]"),
            Self::Vector(ElementType::Table(id)) => format!("[table {id}]"),
        }
    }
}

/// Field of a fixed-layout struct, with its offset resolved at registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    /// Field name
    pub name: &'static str,
    /// Scalar or nested struct type
    pub ty: FieldType,
    /// Byte offset from the start of the struct
    pub offset: usize,
}

/// Field of a vtable-indirected table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableField {
    /// Field name
    pub name: &'static str,
    /// Zero-based vtable slot index
    pub slot: u16,
    /// Declared type
    pub ty: FieldType,
}

impl TableField {
    /// Shorthand constructor used by registration tables
    pub const fn new(name: &'static str, slot: u16, ty: FieldType) -> Self {
        Self { name, slot, ty }
    }

    /// Byte position of this field's entry inside a vtable
    pub const fn vtable_slot(&self) -> usize {
        4 + self.slot as usize * 2
    }
}

/// Fixed inline layout with no indirection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructSchema {
    /// Declared size in bytes, including trailing padding
    pub size: usize,
    /// Fields in declaration order
    pub fields: Vec<StructField>,
}

/// Vtable-indirected layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Fields keyed by slot
    pub fields: Vec<TableField>,
}

/// A registered layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    /// Inline fixed-size record
    Struct(StructSchema),
    /// Vtable-indirected record
    Table(TableSchema),
}

impl Schema {
    /// `"struct"` or `"table"`
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Struct(_) => "struct",
            Self::Table(_) => "table",
        }
    }
}
