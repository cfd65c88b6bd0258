//! Blob (`data.trpfs`) header

use crate::cursor::{ByteReader, RecordError};
use binrw::{BinRead, BinWrite};

/// Magic found at the start of shipped blobs
pub const ONEFILE_MAGIC: [u8; 8] = *b"ONEFILE\0";

/// On-disk size of [`OneFileHeader`]
pub const ONE_FILE_HEADER_SIZE: usize = 0x10;

/// First 16 bytes of a blob: magic and the absolute offset of the
/// filesystem index
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct OneFileHeader {
    /// Magic bytes, not validated when reading
    pub magic: [u8; 8],
    /// Absolute offset of the filesystem index
    pub filesystem_offset: i64,
}

impl OneFileHeader {
    /// Header with the standard magic
    pub const fn new(filesystem_offset: u64) -> Self {
        Self {
            magic: ONEFILE_MAGIC,
            filesystem_offset: filesystem_offset as i64,
        }
    }

    /// Parse from the start of a blob
    pub fn parse(data: &[u8]) -> Result<Self, RecordError> {
        ByteReader::new(data).read_record(0, ONE_FILE_HEADER_SIZE)
    }

    /// Whether the magic is [`ONEFILE_MAGIC`]
    pub fn has_standard_magic(&self) -> bool {
        self.magic == ONEFILE_MAGIC
    }

    /// Index offset, or `None` if negative
    pub fn index_offset(&self) -> Option<usize> {
        usize::try_from(self.filesystem_offset).ok()
    }

    /// Serialized form
    pub fn to_bytes(&self) -> [u8; ONE_FILE_HEADER_SIZE] {
        let mut out = [0u8; ONE_FILE_HEADER_SIZE];
        out[..8].copy_from_slice(&self.magic);
        out[8..].copy_from_slice(&self.filesystem_offset.to_le_bytes());
        out
    }
}
