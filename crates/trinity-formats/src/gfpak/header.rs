//! Fixed-layout GFLXPACK records

use crate::compression::CompressionTag;
use binrw::{BinRead, BinWrite};

/// Archive magic, `"GFLXPACK"` read as a little-endian `u64`
pub const GFPAK_MAGIC: u64 = 0x4B43_4150_584C_4647;

/// The only header version the parser accepts
pub const GFPAK_VERSION: u32 = 0x1000;

/// Archive header
///
/// ```text
/// 0x00  magic         "GFLXPACK"
/// 0x08  version       u32
/// 0x0C  relocated     u32
/// 0x10  file_count    u32
/// 0x14  folder_count  u32
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little, magic = b"GFLXPACK")]
pub struct GfpakHeader {
    /// Format version
    pub version: u32,
    /// Non-zero once the archive has been relocated in memory
    pub relocated: u32,
    /// Number of files
    pub file_count: u32,
    /// Number of folders
    pub folder_count: u32,
}

impl GfpakHeader {
    /// On-disk size
    pub const SIZE: usize = 0x18;
}

/// Folder record, followed by `content_count` [`FolderEntry`] records
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct FolderHeader {
    /// Hash of the folder path
    pub hash: u64,
    /// Number of entries in the folder
    pub content_count: u32,
    /// Always zero
    pub reserved: u32,
}

impl FolderHeader {
    /// On-disk size
    pub const SIZE: usize = 0x10;
}

/// Folder entry naming one file of the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct FolderEntry {
    /// Hash of the file name within the folder
    pub hash: u64,
    /// Index into the file tables
    pub file_index: u32,
    /// Always zero
    pub reserved: u32,
}

impl FolderEntry {
    /// On-disk size
    pub const SIZE: usize = 0x10;
}

/// Per-file payload descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct FileHeader {
    /// Compression level
    pub level: u16,
    /// Raw [`CompressionTag`]
    pub compression_tag: u16,
    /// Decompressed size
    pub buffer_size: u32,
    /// Stored (compressed) size
    pub file_size: u32,
    /// Always zero
    pub reserved: u32,
    /// Absolute payload offset
    pub file_pointer: u64,
}

impl FileHeader {
    /// On-disk size
    pub const SIZE: usize = 0x18;

    /// Parsed compression tag, `None` for unknown values
    pub const fn compression(&self) -> Option<CompressionTag> {
        CompressionTag::from_raw(self.compression_tag)
    }
}
