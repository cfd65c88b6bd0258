//! Pack records stored inside the blob

use super::descriptor::to_records;
use crate::compression::CompressionTag;
use crate::flatbuffer::{DecodeResult, Record, SchemaId, TableRecord, ids, records_of};

/// `EncryptionType` value marking a stored (uncompressed) entry
pub const STORED_ENCRYPTION_TYPE: i8 = -1;

/// One file inside a pack
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackedFile {
    /// Unknown, usually zero
    pub field_00: u32,
    /// `-1` for stored entries, anything else means Oodle
    pub encryption_type: i8,
    /// Compression level used when packing
    pub level: u8,
    /// Decompressed size
    pub file_size: u64,
    /// Raw, possibly compressed, payload
    pub file_buffer: Vec<u8>,
}

impl PackedFile {
    /// Stored entry holding `data`
    pub fn stored(data: Vec<u8>) -> Self {
        Self {
            field_00: 0,
            encryption_type: STORED_ENCRYPTION_TYPE,
            level: 0,
            file_size: data.len() as u64,
            file_buffer: data,
        }
    }

    /// Codec the payload must go through
    pub const fn compression(&self) -> CompressionTag {
        if self.encryption_type == STORED_ENCRYPTION_TYPE {
            CompressionTag::None
        } else {
            CompressionTag::Oodle
        }
    }
}

impl TableRecord for PackedFile {
    const SCHEMA: SchemaId = ids::PACKED_FILE;

    fn from_record(record: &Record) -> DecodeResult<Self> {
        Ok(Self {
            field_00: record.get_or_default("Field_00")?,
            encryption_type: record.get_or_default("EncryptionType")?,
            level: record.get_or_default("Level")?,
            file_size: record.get_or_default("FileSize")?,
            file_buffer: record.get_or_default("FileBuffer")?,
        })
    }

    fn to_record(&self) -> Record {
        Record::new(Self::SCHEMA)
            .with("Field_00", self.field_00)
            .with("EncryptionType", self.encryption_type)
            .with("Level", self.level)
            .with("FileSize", self.file_size)
            .with("FileBuffer", self.file_buffer.clone())
    }
}

/// A decoded pack: file hashes paired with entries
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackedArchive {
    /// Path hashes of the contained files
    pub file_hashes: Vec<u64>,
    /// Entries, parallel to `file_hashes`
    pub entries: Vec<PackedFile>,
}

impl PackedArchive {
    /// Entry for `file_hash`; the first matching hash wins
    pub fn find(&self, file_hash: u64) -> Option<&PackedFile> {
        let index = self.file_hashes.iter().position(|&h| h == file_hash)?;
        self.entries.get(index)
    }

    /// Total size of all raw payloads
    pub fn payload_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.file_buffer.len()).sum()
    }
}

impl TableRecord for PackedArchive {
    const SCHEMA: SchemaId = ids::PACKED_ARCHIVE;

    fn from_record(record: &Record) -> DecodeResult<Self> {
        Ok(Self {
            file_hashes: record.vec_of("FileHashes")?,
            entries: records_of(record, "FileEntry")?,
        })
    }

    fn to_record(&self) -> Record {
        Record::new(Self::SCHEMA)
            .with("FileHashes", self.file_hashes.clone())
            .with("FileEntry", to_records(&self.entries))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::flatbuffer::SchemaRegistry;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compression_mapping() {
        let mut entry = PackedFile::stored(b"abc".to_vec());
        assert_eq!(entry.compression(), CompressionTag::None);
        entry.encryption_type = 0;
        assert_eq!(entry.compression(), CompressionTag::Oodle);
        entry.encryption_type = 5;
        assert_eq!(entry.compression(), CompressionTag::Oodle);
    }

    #[test]
    fn test_pack_roundtrip_and_find() {
        let registry = SchemaRegistry::trinity().unwrap();
        let pack = PackedArchive {
            file_hashes: vec![0xAA, 0xBB],
            entries: vec![
                PackedFile::stored(b"first".to_vec()),
                PackedFile {
                    field_00: 0,
                    encryption_type: 0,
                    level: 4,
                    file_size: 1000,
                    file_buffer: vec![1, 2, 3],
                },
            ],
        };

        let bytes = pack.encode_root(&registry).unwrap();
        let decoded = PackedArchive::decode_root(&registry, &bytes).unwrap();
        assert_eq!(decoded, pack);
        assert_eq!(decoded.find(0xAA).unwrap().file_buffer, b"first");
        assert_eq!(decoded.find(0xBB).unwrap().level, 4);
        assert!(decoded.find(0xCC).is_none());
        assert_eq!(decoded.payload_bytes(), 8);
    }

    #[test]
    fn test_hash_without_entry() {
        let pack = PackedArchive {
            file_hashes: vec![1, 2],
            entries: vec![PackedFile::stored(vec![9])],
        };
        assert!(pack.find(2).is_none());
    }
}
