//! FlatBuffer decoding and schema errors

use super::schema::SchemaId;
use crate::cursor::OutOfBounds;
use thiserror::Error;

/// FlatBuffer operation result type
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors raised while registering schemas, decoding or encoding records
#[derive(Debug, Error)]
pub enum DecodeError {
    /// An offset resolved outside the buffer
    #[error("offset out of range: {0}")]
    OffsetOutOfRange(#[from] OutOfBounds),

    /// A relative offset overflowed or pointed before the buffer start
    #[error("invalid relative offset {relative} from position {position:#x}")]
    BadOffset {
        /// Position the offset was read from
        position: usize,
        /// The offending relative value
        relative: i64,
    },

    /// No schema registered under the requested identifier
    #[error("unknown schema: {0}")]
    UnknownSchema(SchemaId),

    /// A schema was used as the wrong kind (struct where a table is expected)
    #[error("schema {id} is a {actual}, expected a {expected}")]
    SchemaKindMismatch {
        /// Schema identifier
        id: SchemaId,
        /// Kind required by the field
        expected: &'static str,
        /// Kind actually registered
        actual: &'static str,
    },

    /// Nesting exceeded the decoder's depth limit
    #[error("schema nesting deeper than {limit} levels")]
    SchemaTooDeep {
        /// Configured maximum depth
        limit: usize,
    },

    /// Decoded output passed the decoder's budget
    #[error("decoded output larger than {limit} bytes")]
    OutputTooLarge {
        /// Budget in effect for the decode
        limit: usize,
    },

    /// Schema registration was rejected
    #[error("invalid schema {id}: {reason}")]
    InvalidSchema {
        /// Schema identifier
        id: SchemaId,
        /// What was wrong with it
        reason: String,
    },

    /// A value did not have the type its schema or caller expected
    #[error("field {field}: expected {expected}")]
    TypeMismatch {
        /// Field name
        field: String,
        /// Expected type description
        expected: String,
    },

    /// A required field was absent from a decoded record
    #[error("{schema} is missing required field {field}")]
    MissingField {
        /// Record schema
        schema: SchemaId,
        /// Field name
        field: &'static str,
    },
}

impl DecodeError {
    pub(crate) fn mismatch(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
        }
    }

    /// Whether the error points at corrupt input rather than a schema problem
    pub const fn is_corrupt_input(&self) -> bool {
        matches!(
            self,
            Self::OffsetOutOfRange(_) | Self::BadOffset { .. } | Self::OutputTooLarge { .. }
        )
    }
}
