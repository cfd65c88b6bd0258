//! GFLXPACK table parsing and payload extraction

use super::error::{GfpakError, GfpakResult};
use super::header::{FileHeader, FolderEntry, FolderHeader, GFPAK_VERSION, GfpakHeader};
use crate::compression::Decompressor;
use crate::cursor::{ByteReader, OutOfBounds, RecordError};
use binrw::BinRead;
use tracing::debug;

/// Offset of the file-header table pointer
const FILE_TABLE_PTR: usize = 0x18;
/// Offset of the file-hash table pointer
const HASH_TABLE_PTR: usize = 0x20;
/// Start of the folder offset table
const FOLDER_TABLE: usize = 0x28;

/// A folder and the files it names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfpakFolder {
    /// Hash of the folder path
    pub hash: u64,
    /// Files in the folder
    pub entries: Vec<FolderEntry>,
}

/// Parsed tables of a GFLXPACK archive
///
/// Only the tables are held; payloads stay in the caller's buffer and are
/// sliced on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfpakIndex {
    header: GfpakHeader,
    file_hashes: Vec<u64>,
    file_headers: Vec<FileHeader>,
    folders: Vec<GfpakFolder>,
}

impl GfpakIndex {
    /// Parse the header, folder tree, hash table and file-header table
    pub fn parse(data: &[u8]) -> GfpakResult<Self> {
        let reader = ByteReader::new(data);
        let header: GfpakHeader = read_record(&reader, 0, GfpakHeader::SIZE)?;
        if header.version != GFPAK_VERSION {
            return Err(GfpakError::malformed(format!(
                "unsupported version {:#x}, expected {:#x}",
                header.version, GFPAK_VERSION
            )));
        }
        let file_count = header.file_count as usize;
        let folder_count = header.folder_count as usize;

        let file_table = absolute(&reader, reader.read_u64(FILE_TABLE_PTR)?)?;
        let hash_table = absolute(&reader, reader.read_u64(HASH_TABLE_PTR)?)?;

        reader.check(hash_table, span(&reader, hash_table, file_count, 8)?)?;
        let file_hashes = (0..file_count)
            .map(|i| reader.read_u64(hash_table + i * 8))
            .collect::<Result<Vec<_>, _>>()?;

        reader.check(file_table, span(&reader, file_table, file_count, FileHeader::SIZE)?)?;
        let file_headers = (0..file_count)
            .map(|i| read_record(&reader, file_table + i * FileHeader::SIZE, FileHeader::SIZE))
            .collect::<GfpakResult<Vec<FileHeader>>>()?;

        reader.check(FOLDER_TABLE, span(&reader, FOLDER_TABLE, folder_count, 8)?)?;
        let mut folders = Vec::with_capacity(folder_count);
        for i in 0..folder_count {
            let pos = absolute(&reader, reader.read_u64(FOLDER_TABLE + i * 8)?)?;
            let folder: FolderHeader = read_record(&reader, pos, FolderHeader::SIZE)?;

            let entries_pos = pos + FolderHeader::SIZE;
            let count = folder.content_count as usize;
            reader.check(entries_pos, span(&reader, entries_pos, count, FolderEntry::SIZE)?)?;

            let mut entries = Vec::with_capacity(count);
            for j in 0..count {
                let entry: FolderEntry =
                    read_record(&reader, entries_pos + j * FolderEntry::SIZE, FolderEntry::SIZE)?;
                if entry.file_index >= header.file_count {
                    return Err(GfpakError::FileIndexOutOfRange {
                        folder: folder.hash,
                        index: entry.file_index,
                        count: header.file_count,
                    });
                }
                entries.push(entry);
            }
            folders.push(GfpakFolder {
                hash: folder.hash,
                entries,
            });
        }

        debug!(
            "Parsed GFLXPACK v{:#x}: {} files in {} folders",
            header.version, file_count, folder_count
        );

        Ok(Self {
            header,
            file_hashes,
            file_headers,
            folders,
        })
    }

    /// Archive header
    pub const fn header(&self) -> &GfpakHeader {
        &self.header
    }

    /// Number of files
    pub fn file_count(&self) -> usize {
        self.file_hashes.len()
    }

    /// Number of folders
    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    /// Full-path hash of every file, by file index
    pub fn file_hashes(&self) -> &[u64] {
        &self.file_hashes
    }

    /// Folder tree
    pub fn folders(&self) -> &[GfpakFolder] {
        &self.folders
    }

    /// Every `(folder, entry)` pair in folder order
    pub fn entries(&self) -> impl Iterator<Item = (&GfpakFolder, &FolderEntry)> + '_ {
        self.folders
            .iter()
            .flat_map(|folder| folder.entries.iter().map(move |entry| (folder, entry)))
    }

    /// File index whose full-path hash is `hash`; the first match wins
    pub fn find(&self, hash: u64) -> Option<usize> {
        self.file_hashes.iter().position(|&h| h == hash)
    }

    /// File header at `index`
    pub fn file_header(&self, index: usize) -> GfpakResult<&FileHeader> {
        self.file_headers.get(index).ok_or(GfpakError::NoSuchFile(index))
    }

    /// Raw payload of file `index` inside `data`
    pub fn payload<'a>(&self, data: &'a [u8], index: usize) -> GfpakResult<&'a [u8]> {
        let header = self.file_header(index)?;
        let reader = ByteReader::new(data);
        let offset = absolute(&reader, header.file_pointer)?;
        Ok(reader.read_bytes(offset, header.file_size as usize)?)
    }

    /// Payload of file `index`, decompressed to its declared size
    pub fn extract(&self, data: &[u8], index: usize, decompressor: &Decompressor) -> GfpakResult<Vec<u8>> {
        let header = self.file_header(index)?;
        let tag = header.compression().ok_or(GfpakError::UnknownCompression {
            index,
            tag: header.compression_tag,
        })?;
        let payload = self.payload(data, index)?;
        Ok(decompressor.decompress(tag, payload, header.buffer_size as usize)?)
    }
}

fn read_record<T>(reader: &ByteReader<'_>, offset: usize, size: usize) -> GfpakResult<T>
where
    T: for<'b> BinRead<Args<'b> = ()>,
{
    reader.read_record(offset, size).map_err(|e| match e {
        RecordError::OutOfBounds(bounds) if offset == 0 => {
            GfpakError::malformed(format!("archive too small for header: {bounds}"))
        }
        RecordError::OutOfBounds(bounds) => GfpakError::OffsetOutOfRange(bounds),
        RecordError::Malformed { reason, .. } => GfpakError::malformed(reason),
    })
}

/// Convert an on-disk absolute offset to a buffer position
fn absolute(reader: &ByteReader<'_>, offset: u64) -> GfpakResult<usize> {
    usize::try_from(offset).map_err(|_| {
        GfpakError::OffsetOutOfRange(OutOfBounds {
            offset,
            len: 0,
            size: reader.len(),
        })
    })
}

/// Byte length of `count` records of `size` bytes at `offset`
fn span(reader: &ByteReader<'_>, offset: usize, count: usize, size: usize) -> GfpakResult<usize> {
    count.checked_mul(size).ok_or_else(|| {
        GfpakError::OffsetOutOfRange(OutOfBounds {
            offset: offset as u64,
            len: u64::MAX,
            size: reader.len(),
        })
    })
}
