//! TRPFD/TRPFS resolver
//!
//! A split archive is a descriptor (`data.trpfd`) and a blob (`data.trpfs`).
//! Resolving a file takes four hops:
//!
//! 1. file hash -> descriptor row -> pack index
//! 2. pack index -> pack name and declared pack size
//! 3. FNV-1a of the pack name -> blob offset, via the filesystem index stored
//!    at the offset named by the blob header
//! 4. pack bytes -> decoded pack (cached) -> entry for the file hash
//!
//! Every hop that misses yields `Ok(None)`. A pack index outside the pack
//! tables is [`StorageError::DanglingPackIndex`].

use crate::context::ArchiveContext;
use crate::pack_cache::PackCache;
use crate::source::ArchiveSource;
use crate::{AssetKey, AssetResolver, Result, StorageError, has_extension, open_source};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use trinity_formats::cursor::ByteReader;
use trinity_formats::flatbuffer::{TableRecord, ids};
use trinity_formats::hash::fnv1a64;
use trinity_formats::resource::{
    FileDescriptor, FileInfo, FilesystemIndex, OneFileHeader, PackedArchive,
};

/// Descriptor file name inside an `arc` directory
pub const DESCRIPTOR_FILE: &str = "data.trpfd";

/// Blob file name inside an `arc` directory
pub const BLOB_FILE: &str = "data.trpfs";

/// Open descriptor and blob pair
#[derive(Debug)]
pub struct SplitArchive {
    descriptor: FileDescriptor,
    filesystem: FilesystemIndex,
    blob: ArchiveSource,
    /// File hash -> descriptor row, first occurrence wins
    file_rows: HashMap<u64, usize>,
    /// Unused file hash -> unused row
    unused_rows: HashMap<u64, usize>,
    /// Pack-name hash -> filesystem row
    pack_rows: HashMap<u64, usize>,
    packs: PackCache,
    context: ArchiveContext,
}

impl SplitArchive {
    /// Open with default settings
    pub fn open(descriptor: impl AsRef<Path>, blob: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(descriptor, blob, &ArchiveContext::new()?)
    }

    /// Open `data.trpfd` and `data.trpfs` inside `dir`
    pub fn open_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_dir_with(dir, &ArchiveContext::new()?)
    }

    /// [`SplitArchive::open_dir`] sharing `context`
    pub fn open_dir_with(dir: impl AsRef<Path>, context: &ArchiveContext) -> Result<Self> {
        let dir = dir.as_ref();
        Self::open_with(dir.join(DESCRIPTOR_FILE), dir.join(BLOB_FILE), context)
    }

    /// Open sharing `context`'s configuration, registry, name cache and codecs
    pub fn open_with(
        descriptor: impl AsRef<Path>,
        blob: impl AsRef<Path>,
        context: &ArchiveContext,
    ) -> Result<Self> {
        let (descriptor_path, blob_path): (PathBuf, PathBuf) =
            (descriptor.as_ref().into(), blob.as_ref().into());
        let use_mmap = context.config().use_mmap;

        // The descriptor is fully decoded, so its bytes are released here
        let descriptor = {
            let source = open_source(&descriptor_path, use_mmap)?;
            decode_descriptor(&source, context)?
        };
        let blob = open_source(&blob_path, use_mmap)?;
        let archive = Self::from_parts(descriptor, blob, context)?;

        info!(
            "Opened split archive {} + {}: {} files, {} packs, {} blob bytes",
            descriptor_path.display(),
            blob_path.display(),
            archive.file_count(),
            archive.descriptor.pack_names.len(),
            archive.blob.len()
        );
        Ok(archive)
    }

    /// Build from descriptor and blob bytes already in memory
    pub fn from_sources(
        descriptor: &[u8],
        blob: ArchiveSource,
        context: &ArchiveContext,
    ) -> Result<Self> {
        let descriptor = decode_descriptor(descriptor, context)?;
        Self::from_parts(descriptor, blob, context)
    }

    fn from_parts(descriptor: FileDescriptor, blob: ArchiveSource, context: &ArchiveContext) -> Result<Self> {
        let filesystem = decode_filesystem(&blob, context)?;

        let file_rows = first_rows(&descriptor.file_hashes);
        let unused_rows = first_rows(&descriptor.unused_hashes);
        let pack_rows = first_rows(&filesystem.file_hashes);
        if filesystem.file_hashes.len() != filesystem.file_offsets.len() {
            warn!(
                "Filesystem index lists {} pack hashes but {} offsets",
                filesystem.file_hashes.len(),
                filesystem.file_offsets.len()
            );
        }

        Ok(Self {
            descriptor,
            filesystem,
            blob,
            file_rows,
            unused_rows,
            pack_rows,
            packs: PackCache::new(context.config().pack_cache_budget),
            context: context.clone(),
        })
    }

    /// Decompressed bytes of `key`, or `None` if any hop misses
    pub fn extract(&self, key: AssetKey<'_>) -> Result<Option<Vec<u8>>> {
        let hash = key.hash();

        let Some(info) = self.locate(hash) else {
            debug!("{} ({:016X}) has no descriptor row", key, hash);
            return Ok(None);
        };

        let (pack_name, pack_info) = match self.descriptor.pack(info.pack_index) {
            Some(pack) => pack,
            None => {
                let pack_count = self.pack_count();
                warn!(
                    "{:016X} references pack {} but only {} packs exist",
                    hash, info.pack_index, pack_count
                );
                return Err(StorageError::DanglingPackIndex {
                    file_hash: hash,
                    pack_index: info.pack_index,
                    pack_count,
                });
            }
        };
        if pack_name.trim().is_empty() {
            debug!("{:016X} belongs to pack {} which has no name", hash, info.pack_index);
            return Ok(None);
        }

        let pack_hash = fnv1a64(pack_name.as_bytes());
        let Some(offset) = self.pack_offset(pack_hash) else {
            debug!("Pack {} ({:016X}) not in filesystem index", pack_name, pack_hash);
            return Ok(None);
        };

        let pack = self
            .packs
            .get_or_try_insert_with(pack_hash, || self.decode_pack(pack_name, offset, pack_info.file_size))?;

        let Some(entry) = pack.archive().find(hash) else {
            debug!("{:016X} not in pack {}", hash, pack_name);
            return Ok(None);
        };

        let compression = entry.compression();
        if compression.is_stored() {
            if entry.file_buffer.len() as u64 != entry.file_size {
                warn!(
                    "Stored entry {:016X} holds {} bytes but declares {}",
                    hash,
                    entry.file_buffer.len(),
                    entry.file_size
                );
            }
            return Ok(Some(entry.file_buffer.clone()));
        }

        let declared = usize::try_from(entry.file_size).map_err(|_| {
            StorageError::MalformedHeader(format!("entry {hash:016X} declares {} bytes", entry.file_size))
        })?;
        let data = self
            .context
            .decompressor()
            .decompress(compression, &entry.file_buffer, declared)?;
        Ok(Some(data))
    }

    /// Named files whose name satisfies `predicate`
    pub fn find_files(&self, predicate: impl Fn(&str) -> bool) -> Vec<(u64, String)> {
        let cache = self.context.hash_cache();
        self.descriptor
            .file_hashes
            .iter()
            .filter_map(|&hash| {
                let name = cache.name(hash)?;
                predicate(&name).then_some((hash, name))
            })
            .collect()
    }

    /// Number of files in the descriptor
    pub fn file_count(&self) -> usize {
        self.descriptor.file_hashes.len()
    }

    /// File hashes in descriptor order
    pub fn file_hashes(&self) -> &[u64] {
        &self.descriptor.file_hashes
    }

    /// Pack names in descriptor order
    pub fn pack_names(&self) -> &[String] {
        &self.descriptor.pack_names
    }

    /// Name of pack `index`
    pub fn pack_name(&self, index: usize) -> Option<&str> {
        self.descriptor.pack_names.get(index).map(String::as_str)
    }

    /// Descriptor row for the file at `index` in [`SplitArchive::file_hashes`]
    pub fn file_info(&self, index: usize) -> Option<&FileInfo> {
        self.descriptor.file_info.get(index)
    }

    /// Pack index holding `file_hash`
    pub fn pack_index_for_file(&self, file_hash: u64) -> Option<u64> {
        self.locate(file_hash).map(|info| info.pack_index)
    }

    /// Hashes of every listed file stored in pack `pack_index`
    pub fn files_in_pack(&self, pack_index: u64) -> Vec<u64> {
        self.descriptor
            .file_hashes
            .iter()
            .zip(&self.descriptor.file_info)
            .filter(|(_, info)| info.pack_index == pack_index)
            .map(|(&hash, _)| hash)
            .collect()
    }

    /// Drop every decoded pack
    pub fn clear_pack_cache(&self) {
        self.packs.clear();
    }

    /// Number of decoded packs held
    pub fn cached_pack_count(&self) -> usize {
        self.packs.len()
    }

    /// Decoded pack cache
    pub const fn pack_cache(&self) -> &PackCache {
        &self.packs
    }

    /// The decoded descriptor
    pub const fn descriptor(&self) -> &FileDescriptor {
        &self.descriptor
    }

    /// The blob's filesystem index
    pub const fn filesystem(&self) -> &FilesystemIndex {
        &self.filesystem
    }

    /// Collaborators this archive was opened with
    pub const fn context(&self) -> &ArchiveContext {
        &self.context
    }

    /// Number of packs addressable through both pack tables
    fn pack_count(&self) -> usize {
        self.descriptor.pack_names.len().min(self.descriptor.pack_info.len())
    }

    /// Descriptor row for `hash`, falling back to the unused tables
    fn locate(&self, hash: u64) -> Option<&FileInfo> {
        if let Some(&row) = self.file_rows.get(&hash) {
            return self.descriptor.file_info.get(row);
        }
        let row = *self.unused_rows.get(&hash)?;
        self.descriptor.unused_file_info.get(row)
    }

    fn pack_offset(&self, pack_hash: u64) -> Option<u64> {
        let row = *self.pack_rows.get(&pack_hash)?;
        self.filesystem.file_offsets.get(row).copied()
    }

    fn decode_pack(&self, name: &str, offset: u64, size: u64) -> Result<PackedArchive> {
        let reader = ByteReader::new(&self.blob);
        let bytes = match (usize::try_from(offset), usize::try_from(size)) {
            (Ok(offset), Ok(size)) => reader.read_bytes(offset, size)?,
            _ => {
                return Err(StorageError::OffsetOutOfRange(format!(
                    "pack {name} at {offset:#x} ({size} bytes) exceeds the address space"
                )));
            }
        };
        debug!("Decoding pack {} at {:#x} ({} bytes)", name, offset, size);
        let record = self.context.decoder().decode_root(bytes, ids::PACKED_ARCHIVE)?;
        Ok(PackedArchive::from_record(&record)?)
    }
}

impl AssetResolver for SplitArchive {
    fn extract(&self, key: AssetKey<'_>) -> Result<Option<Vec<u8>>> {
        Self::extract(self, key)
    }

    fn find_by_extension(&self, extension: &str) -> Vec<(u64, String)> {
        self.find_files(|name| has_extension(name, extension))
    }
}

fn decode_descriptor(bytes: &[u8], context: &ArchiveContext) -> Result<FileDescriptor> {
    let record = context
        .decoder()
        .decode_root(bytes, ids::CUSTOM_FILE_DESCRIPTOR)?;
    Ok(FileDescriptor::from_record(&record)?)
}

fn decode_filesystem(blob: &[u8], context: &ArchiveContext) -> Result<FilesystemIndex> {
    let header = OneFileHeader::parse(blob)
        .map_err(|e| StorageError::MalformedHeader(format!("blob header: {e}")))?;
    if !header.has_standard_magic() {
        warn!("Blob magic {:02X?} is not ONEFILE", header.magic);
    }
    let offset = header.index_offset().ok_or_else(|| {
        StorageError::MalformedHeader(format!(
            "negative filesystem index offset {}",
            header.filesystem_offset
        ))
    })?;
    let index_bytes = blob.get(offset..).ok_or_else(|| {
        StorageError::OffsetOutOfRange(format!(
            "filesystem index at {offset:#x} is past the end of a {} byte blob",
            blob.len()
        ))
    })?;

    let record = context.decoder().decode_root(index_bytes, ids::FILE_SYSTEM)?;
    Ok(FilesystemIndex::from_record(&record)?)
}

fn first_rows(hashes: &[u64]) -> HashMap<u64, usize> {
    let mut rows = HashMap::with_capacity(hashes.len());
    for (row, &hash) in hashes.iter().enumerate() {
        rows.entry(hash).or_insert(row);
    }
    rows
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_first_rows() {
        let rows = first_rows(&[5, 6, 5]);
        assert_eq!(rows.get(&5), Some(&0));
        assert_eq!(rows.get(&6), Some(&1));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_blob_without_header() {
        let context = ArchiveContext::new().unwrap();
        let err = decode_filesystem(b"ONEFILE", &context).unwrap_err();
        assert!(matches!(err, StorageError::MalformedHeader(_)));
    }

    #[test]
    fn test_index_past_end() {
        let context = ArchiveContext::new().unwrap();
        let blob = OneFileHeader::new(0x100).to_bytes();
        let err = decode_filesystem(&blob, &context).unwrap_err();
        assert!(matches!(err, StorageError::OffsetOutOfRange(_)));
    }

    #[test]
    fn test_negative_index_offset() {
        let context = ArchiveContext::new().unwrap();
        let mut blob = OneFileHeader::new(0).to_bytes();
        blob[8..].copy_from_slice(&(-1i64).to_le_bytes());
        let err = decode_filesystem(&blob, &context).unwrap_err();
        assert!(matches!(err, StorageError::MalformedHeader(_)));
    }
}
