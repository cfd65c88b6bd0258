//! Error types for GFLXPACK operations

use crate::compression::DecompressionError;
use crate::cursor::OutOfBounds;
use thiserror::Error;

/// GFLXPACK operation result type
pub type GfpakResult<T> = Result<T, GfpakError>;

/// Errors raised while parsing, extracting from or building GFLXPACK archives
#[derive(Debug, Error)]
pub enum GfpakError {
    /// Bad magic, unsupported version or an inconsistent header
    #[error("Malformed GFLXPACK header: {reason}")]
    MalformedHeader {
        /// What was wrong
        reason: String,
    },

    /// A table or payload lies outside the archive
    #[error("Offset out of range: {0}")]
    OffsetOutOfRange(#[from] OutOfBounds),

    /// A folder entry references a file that does not exist
    #[error("Folder {folder:#018x} references file {index}, archive has {count} files")]
    FileIndexOutOfRange {
        /// Folder hash
        folder: u64,
        /// Referenced file index
        index: u32,
        /// Number of files in the archive
        count: u32,
    },

    /// Requested file index does not exist
    #[error("No file at index {0}")]
    NoSuchFile(usize),

    /// Unknown compression tag in a file header
    #[error("File {index} has unknown compression tag {tag}")]
    UnknownCompression {
        /// File index
        index: usize,
        /// Raw tag
        tag: u16,
    },

    /// Payload decompression failed
    #[error("Decompression failed: {0}")]
    Decompression(#[from] DecompressionError),

    /// A value does not fit its on-disk field while building
    #[error("Archive too large: {0}")]
    TooLarge(String),

    /// Record serialization failed while building
    #[error("Failed to write record: {0}")]
    Write(#[from] binrw::Error),
}

impl GfpakError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedHeader {
            reason: reason.into(),
        }
    }
}
