//! GFLXPACK (`.trpak` / `.gfpak`) monolithic archive format
//!
//! A single file holding a folder tree, a table of full-path hashes, a table
//! of per-file headers and the payloads themselves.
//!
//! ```text
//! 0x00  GfpakHeader (0x18)
//! 0x18  file header table offset   u64
//! 0x20  file hash table offset     u64
//! 0x28  folder offsets             u64 * folder_count
//!       ...
//!       FolderHeader (0x10) + FolderEntry (0x10) * content_count, per folder
//!       u64 * file_count           full-path hashes
//!       FileHeader (0x18) * file_count
//!       payloads
//! ```
//!
//! Full-path hashes are [`hash_path`](crate::hash::hash_path) of the
//! normalized path; folder and file-name hashes are raw FNV-1a of their
//! strings.

mod builder;
mod error;
mod header;
mod index;

pub use builder::{DEFAULT_VERSION, GfpakBuilder};
pub use error::{GfpakError, GfpakResult};
pub use header::{FileHeader, FolderEntry, FolderHeader, GFPAK_MAGIC, GFPAK_VERSION, GfpakHeader};
pub use index::{GfpakFolder, GfpakIndex};

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compression::{CompressionTag, Decompressor};
    use crate::hash::hash_path;

    fn sample() -> Vec<u8> {
        let mut builder = GfpakBuilder::new();
        builder
            .add_file("arc/", "one.trmdl", b"model".to_vec(), CompressionTag::None)
            .add_file("arc/", "two.trmsh", b"mesh".to_vec(), CompressionTag::None);
        builder.build().unwrap()
    }

    #[test]
    fn test_truncated_archive() {
        let bytes = sample();
        assert!(matches!(
            GfpakIndex::parse(&bytes[..0x10]),
            Err(GfpakError::MalformedHeader { .. })
        ));
        // Cut inside the file header table
        let cut = bytes.len() - 9 - 0x18;
        assert!(matches!(
            GfpakIndex::parse(&bytes[..cut]),
            Err(GfpakError::OffsetOutOfRange(_))
        ));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = sample();
        bytes[0] = b'X';
        assert!(matches!(
            GfpakIndex::parse(&bytes),
            Err(GfpakError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_forged_file_count() {
        let mut bytes = sample();
        bytes[0x10..0x14].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            GfpakIndex::parse(&bytes),
            Err(GfpakError::OffsetOutOfRange(_))
        ));
    }

    #[test]
    fn test_payload_out_of_range() {
        let bytes = sample();
        let index = GfpakIndex::parse(&bytes).unwrap();
        let file = index.find(hash_path("arc/two.trmsh")).unwrap();
        let truncated = &bytes[..bytes.len() - 2];
        assert!(matches!(
            index.extract(truncated, file, &Decompressor::new()),
            Err(GfpakError::OffsetOutOfRange(_))
        ));
        assert!(matches!(index.file_header(99), Err(GfpakError::NoSuchFile(99))));
    }

    #[test]
    fn test_unknown_compression_tag() {
        let mut bytes = sample();
        let index = GfpakIndex::parse(&bytes).unwrap();
        let file_table = u64::from_le_bytes(bytes[0x18..0x20].try_into().unwrap()) as usize;
        bytes[file_table + 2..file_table + 4].copy_from_slice(&7u16.to_le_bytes());

        let index_after = GfpakIndex::parse(&bytes).unwrap();
        assert_eq!(index_after.file_count(), index.file_count());
        assert!(matches!(
            index_after.extract(&bytes, 0, &Decompressor::new()),
            Err(GfpakError::UnknownCompression { index: 0, tag: 7 })
        ));
    }
}
