//! Immutable schema registry and its builder
//!
//! A registry is assembled once with [`SchemaRegistryBuilder`] and then only
//! read. Decoders borrow it, so independent registries (one per test, or one
//! per game generation) never interfere with each other.

use super::error::{DecodeError, DecodeResult};
use super::schema::{FieldType, Schema, SchemaId, StructField, StructSchema, TableField, TableSchema};
use std::collections::{HashMap, HashSet};

/// Read-only table mapping record-type identifiers to layouts
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<SchemaId, Schema>,
}

impl SchemaRegistry {
    /// Start an empty builder
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Layout registered under `id`
    pub fn lookup(&self, id: SchemaId) -> DecodeResult<&Schema> {
        self.schemas.get(&id).ok_or(DecodeError::UnknownSchema(id))
    }

    /// Struct layout registered under `id`
    pub fn struct_schema(&self, id: SchemaId) -> DecodeResult<&StructSchema> {
        match self.lookup(id)? {
            Schema::Struct(schema) => Ok(schema),
            other => Err(DecodeError::SchemaKindMismatch {
                id,
                expected: "struct",
                actual: other.kind_name(),
            }),
        }
    }

    /// Table layout registered under `id`
    pub fn table_schema(&self, id: SchemaId) -> DecodeResult<&TableSchema> {
        match self.lookup(id)? {
            Schema::Table(schema) => Ok(schema),
            other => Err(DecodeError::SchemaKindMismatch {
                id,
                expected: "table",
                actual: other.kind_name(),
            }),
        }
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: SchemaId) -> bool {
        self.schemas.contains_key(&id)
    }

    /// Number of registered layouts
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Iterate over registered identifiers
    pub fn ids(&self) -> impl Iterator<Item = SchemaId> + '_ {
        self.schemas.keys().copied()
    }
}

/// Collects schema registrations and validates them
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    schemas: HashMap<SchemaId, Schema>,
}

impl SchemaRegistryBuilder {
    /// Register a fixed-layout struct
    ///
    /// Fields are laid out back to back in declaration order. They may only be
    /// scalars or structs registered earlier, and together must fit in `size`.
    pub fn register_struct(
        &mut self,
        id: SchemaId,
        size: usize,
        fields: &[(&'static str, FieldType)],
    ) -> DecodeResult<&mut Self> {
        self.ensure_unregistered(id)?;

        let mut offset = 0usize;
        let mut laid_out = Vec::with_capacity(fields.len());
        for &(name, ty) in fields {
            let width = match ty {
                FieldType::Scalar(kind) => kind.width(),
                FieldType::Struct(nested) => match self.schemas.get(&nested) {
                    Some(Schema::Struct(schema)) => schema.size,
                    Some(Schema::Table(_)) => {
                        return Err(invalid(id, format!("field {name} embeds table {nested}")));
                    }
                    None => {
                        return Err(invalid(
                            id,
                            format!("field {name} embeds struct {nested}, which is not registered yet"),
                        ));
                    }
                },
                other => {
                    return Err(invalid(
                        id,
                        format!("field {name} has non-inline type {}", other.describe()),
                    ));
                }
            };
            laid_out.push(StructField { name, ty, offset });
            offset += width;
        }

        if offset > size {
            return Err(invalid(
                id,
                format!("fields need {offset} bytes but declared size is {size}"),
            ));
        }

        self.schemas.insert(
            id,
            Schema::Struct(StructSchema {
                size,
                fields: laid_out,
            }),
        );
        Ok(self)
    }

    /// Register a vtable-indirected table
    ///
    /// Referenced tables and structs may be registered later; they are only
    /// resolved at decode time.
    pub fn register_table(&mut self, id: SchemaId, fields: &[TableField]) -> DecodeResult<&mut Self> {
        self.ensure_unregistered(id)?;

        let mut slots = HashSet::with_capacity(fields.len());
        let mut names = HashSet::with_capacity(fields.len());
        for field in fields {
            if !slots.insert(field.slot) {
                return Err(invalid(id, format!("slot {} declared twice", field.slot)));
            }
            if !names.insert(field.name) {
                return Err(invalid(id, format!("field {} declared twice", field.name)));
            }
        }

        self.schemas.insert(
            id,
            Schema::Table(TableSchema {
                fields: fields.to_vec(),
            }),
        );
        Ok(self)
    }

    /// Freeze the registrations
    pub fn build(self) -> SchemaRegistry {
        SchemaRegistry {
            schemas: self.schemas,
        }
    }

    fn ensure_unregistered(&self, id: SchemaId) -> DecodeResult<()> {
        if self.schemas.contains_key(&id) {
            return Err(invalid(id, "already registered".to_string()));
        }
        Ok(())
    }
}

fn invalid(id: SchemaId, reason: String) -> DecodeError {
    DecodeError::InvalidSchema { id, reason }
}
