//! Descriptor (`data.trpfd`) and filesystem index records

use crate::flatbuffer::{DecodeResult, Record, SchemaId, TableRecord, ids, records_of};

/// Which pack holds a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileInfo {
    /// Index into the descriptor's pack tables
    pub pack_index: u64,
    /// Unused by the engine
    pub unused_table: u32,
}

impl TableRecord for FileInfo {
    const SCHEMA: SchemaId = ids::FILE_INFO;

    fn from_record(record: &Record) -> DecodeResult<Self> {
        Ok(Self {
            pack_index: record.get_or_default("PackIndex")?,
            unused_table: record.get_or_default("UnusedTable")?,
        })
    }

    fn to_record(&self) -> Record {
        Record::new(Self::SCHEMA)
            .with("PackIndex", self.pack_index)
            .with("UnusedTable", self.unused_table)
    }
}

/// Size and content count of a pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackInfo {
    /// Size in bytes of the serialized pack inside the blob
    pub file_size: u64,
    /// Number of files in the pack
    pub file_count: u64,
}

impl TableRecord for PackInfo {
    const SCHEMA: SchemaId = ids::PACK_INFO;

    fn from_record(record: &Record) -> DecodeResult<Self> {
        Ok(Self {
            file_size: record.get_or_default("FileSize")?,
            file_count: record.get_or_default("FileCount")?,
        })
    }

    fn to_record(&self) -> Record {
        Record::new(Self::SCHEMA)
            .with("FileSize", self.file_size)
            .with("FileCount", self.file_count)
    }
}

/// File hash to pack mapping
///
/// Decoded with the `CustomFileDescriptor` layout, a superset of the plain
/// `FileDescriptor` one: older descriptors simply lack the unused arrays.
/// `file_info[i]` belongs to `file_hashes[i]`; the arrays are not guaranteed
/// to have equal lengths.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileDescriptor {
    /// Path hashes of every listed file
    pub file_hashes: Vec<u64>,
    /// Pack names, addressed by [`FileInfo::pack_index`]
    pub pack_names: Vec<String>,
    /// Per-file pack assignment
    pub file_info: Vec<FileInfo>,
    /// Per-pack size information
    pub pack_info: Vec<PackInfo>,
    /// Hashes of files the game no longer references
    pub unused_hashes: Vec<u64>,
    /// Pack assignment of the unused files
    pub unused_file_info: Vec<FileInfo>,
}

impl FileDescriptor {
    /// Pack name and declared size for `pack_index`, if both tables cover it
    pub fn pack(&self, pack_index: u64) -> Option<(&str, &PackInfo)> {
        let index = usize::try_from(pack_index).ok()?;
        let name = self.pack_names.get(index)?;
        let info = self.pack_info.get(index)?;
        Some((name.as_str(), info))
    }
}

impl TableRecord for FileDescriptor {
    const SCHEMA: SchemaId = ids::CUSTOM_FILE_DESCRIPTOR;

    fn from_record(record: &Record) -> DecodeResult<Self> {
        Ok(Self {
            file_hashes: record.vec_of("FileHashes")?,
            pack_names: record.vec_of("PackNames")?,
            file_info: records_of(record, "FileInfo")?,
            pack_info: records_of(record, "PackInfo")?,
            unused_hashes: record.vec_of("UnusedHashes")?,
            unused_file_info: records_of(record, "UnusedFileInfo")?,
        })
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new(Self::SCHEMA)
            .with("FileHashes", self.file_hashes.clone())
            .with("PackNames", self.pack_names.clone())
            .with("FileInfo", to_records(&self.file_info))
            .with("PackInfo", to_records(&self.pack_info));
        if !self.unused_hashes.is_empty() || !self.unused_file_info.is_empty() {
            record.set("UnusedHashes", self.unused_hashes.clone());
            record.set("UnusedFileInfo", to_records(&self.unused_file_info));
        }
        record
    }
}

/// Pack-name hash to blob offset mapping (layout `FileSystem`)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilesystemIndex {
    /// Raw FNV-1a hashes of pack names
    pub file_hashes: Vec<u64>,
    /// Absolute blob offset of each pack
    pub file_offsets: Vec<u64>,
}

impl FilesystemIndex {
    /// Blob offset of the pack whose name hashes to `pack_hash`
    ///
    /// The first matching entry wins.
    pub fn offset_of(&self, pack_hash: u64) -> Option<u64> {
        let index = self.file_hashes.iter().position(|&h| h == pack_hash)?;
        self.file_offsets.get(index).copied()
    }
}

impl TableRecord for FilesystemIndex {
    const SCHEMA: SchemaId = ids::FILE_SYSTEM;

    fn from_record(record: &Record) -> DecodeResult<Self> {
        Ok(Self {
            file_hashes: record.vec_of("FileHashes")?,
            file_offsets: record.vec_of("FileOffsets")?,
        })
    }

    fn to_record(&self) -> Record {
        Record::new(Self::SCHEMA)
            .with("FileHashes", self.file_hashes.clone())
            .with("FileOffsets", self.file_offsets.clone())
    }
}

pub(super) fn to_records<T: TableRecord>(items: &[T]) -> Vec<Record> {
    items.iter().map(TableRecord::to_record).collect()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::flatbuffer::SchemaRegistry;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_descriptor_roundtrip() {
        let registry = SchemaRegistry::trinity().unwrap();
        let descriptor = FileDescriptor {
            file_hashes: vec![0x11, 0x22],
            pack_names: vec!["arc/data_0000.trpak".to_string()],
            file_info: vec![FileInfo {
                pack_index: 0,
                unused_table: 0,
            }],
            pack_info: vec![PackInfo {
                file_size: 128,
                file_count: 1,
            }],
            unused_hashes: vec![0x33],
            unused_file_info: vec![FileInfo::default()],
        };

        let bytes = descriptor.encode_root(&registry).unwrap();
        let decoded = FileDescriptor::decode_root(&registry, &bytes).unwrap();
        assert_eq!(decoded, descriptor);
        assert_eq!(decoded.pack(0).map(|(name, info)| (name, info.file_size)), Some(("arc/data_0000.trpak", 128)));
        assert!(decoded.pack(1).is_none());
    }

    #[test]
    fn test_plain_descriptor_has_no_unused_arrays() {
        let registry = SchemaRegistry::trinity().unwrap();
        let descriptor = FileDescriptor {
            file_hashes: vec![7],
            ..FileDescriptor::default()
        };
        let record = descriptor.to_record();
        assert!(!record.contains("UnusedHashes"));

        let bytes = descriptor.encode_root(&registry).unwrap();
        let decoded = FileDescriptor::decode_root(&registry, &bytes).unwrap();
        assert!(decoded.unused_hashes.is_empty());
        assert_eq!(decoded.file_hashes, vec![7]);
    }

    #[test]
    fn test_filesystem_lookup_first_wins() {
        let index = FilesystemIndex {
            file_hashes: vec![5, 9, 5],
            file_offsets: vec![64, 128, 256],
        };
        assert_eq!(index.offset_of(5), Some(64));
        assert_eq!(index.offset_of(9), Some(128));
        assert_eq!(index.offset_of(1), None);

        let short = FilesystemIndex {
            file_hashes: vec![5],
            file_offsets: Vec::new(),
        };
        assert_eq!(short.offset_of(5), None);
    }
}
