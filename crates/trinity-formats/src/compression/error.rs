//! Decompression errors

use super::CompressionTag;
use thiserror::Error;

/// Decompression result type
pub type DecompressionResult<T> = Result<T, DecompressionError>;

/// Errors raised by codecs and the decompression dispatcher
#[derive(Debug, Error)]
pub enum DecompressionError {
    /// Codec output length differs from the declared size
    #[error("decompressed size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Declared size
        expected: usize,
        /// Bytes actually produced
        actual: usize,
    },

    /// No codec registered for the tag
    #[error("no codec registered for {0}")]
    UnsupportedCodec(CompressionTag),

    /// Unknown raw compression tag
    #[error("unknown compression tag {0}")]
    UnknownTag(u16),

    /// The codec reported corrupt input
    #[error("{codec} codec failed: {reason}")]
    Codec {
        /// Codec name
        codec: &'static str,
        /// Codec-reported reason
        reason: String,
    },

    /// Declared size exceeds the decompression ceiling
    #[error("declared size {size} exceeds limit of {limit} bytes")]
    TooLarge {
        /// Declared size
        size: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// The codec cannot compress
    #[error("{0} codec does not support compression")]
    CompressionUnsupported(&'static str),
}

impl DecompressionError {
    pub(crate) fn codec(codec: &'static str, reason: impl ToString) -> Self {
        Self::Codec {
            codec,
            reason: reason.to_string(),
        }
    }
}
