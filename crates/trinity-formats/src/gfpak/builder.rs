//! GFLXPACK archive builder
//!
//! Writes archives that [`GfpakIndex::parse`](super::GfpakIndex::parse)
//! reads back. Layout produced:
//!
//! ```text
//! [header][file table ptr][hash table ptr][folder offsets]
//! [file hashes][folder 0 header + entries]...[file headers][payloads]
//! ```
//!
//! Folder hashes and file-name hashes are raw FNV-1a of the strings; the
//! full-path hash of each file is [`hash_path`] of `folder + name`.

use super::error::{GfpakError, GfpakResult};
use super::header::{FileHeader, FolderEntry, FolderHeader, GFPAK_VERSION, GfpakHeader};
use crate::compression::{CompressionTag, DecompressionError, Decompressor};
use crate::hash::{fnv1a64, hash_path};
use binrw::BinWrite;
use std::io::Cursor;

/// Version written by default
pub const DEFAULT_VERSION: u32 = GFPAK_VERSION;

#[derive(Debug, Clone)]
struct PendingFile {
    name: String,
    data: Vec<u8>,
    compression: CompressionTag,
    level: u16,
}

#[derive(Debug, Clone)]
struct PendingFolder {
    path: String,
    files: Vec<PendingFile>,
}

/// Collects folders and files, then serializes a complete archive
#[derive(Debug, Clone)]
pub struct GfpakBuilder {
    version: u32,
    folders: Vec<PendingFolder>,
}

impl Default for GfpakBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GfpakBuilder {
    /// Empty archive
    pub fn new() -> Self {
        Self {
            version: DEFAULT_VERSION,
            folders: Vec::new(),
        }
    }

    /// Set the header version; anything but [`GFPAK_VERSION`] is rejected
    /// when parsed back
    #[must_use]
    pub const fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Add a file to `folder` (a path prefix such as `"arc/pokemon/"`)
    ///
    /// Folders are created on first use and keep insertion order.
    pub fn add_file(
        &mut self,
        folder: &str,
        name: &str,
        data: impl Into<Vec<u8>>,
        compression: CompressionTag,
    ) -> &mut Self {
        let file = PendingFile {
            name: name.to_string(),
            data: data.into(),
            compression,
            level: if compression.is_stored() { 0 } else { 9 },
        };
        match self.folders.iter_mut().find(|f| f.path == folder) {
            Some(existing) => existing.files.push(file),
            None => self.folders.push(PendingFolder {
                path: folder.to_string(),
                files: vec![file],
            }),
        }
        self
    }

    /// Number of files added so far
    pub fn file_count(&self) -> usize {
        self.folders.iter().map(|f| f.files.len()).sum()
    }

    /// Serialize with the built-in codecs
    pub fn build(&self) -> GfpakResult<Vec<u8>> {
        self.build_with(&Decompressor::new())
    }

    /// Serialize, compressing payloads with the codecs of `codecs`
    pub fn build_with(&self, codecs: &Decompressor) -> GfpakResult<Vec<u8>> {
        let file_count = self.file_count();
        let folder_count = self.folders.len();

        // Compress first so the file headers can be sized
        let mut payloads = Vec::with_capacity(file_count);
        for folder in &self.folders {
            for file in &folder.files {
                let stored = if file.compression.is_stored() {
                    file.data.clone()
                } else {
                    let codec = codecs
                        .codec(file.compression)
                        .ok_or(DecompressionError::UnsupportedCodec(file.compression))?;
                    codec.compress(&file.data)?
                };
                payloads.push(stored);
            }
        }

        let hash_table = GfpakHeader::SIZE + 16 + folder_count * 8;
        let folders_start = hash_table + file_count * 8;
        let folder_sizes: Vec<usize> = self
            .folders
            .iter()
            .map(|f| FolderHeader::SIZE + f.files.len() * FolderEntry::SIZE)
            .collect();
        let file_table = folders_start + folder_sizes.iter().sum::<usize>();
        let payload_start = file_table + file_count * FileHeader::SIZE;

        let mut out = Cursor::new(Vec::new());
        GfpakHeader {
            version: self.version,
            relocated: 0,
            file_count: to_u32(file_count, "file count")?,
            folder_count: to_u32(folder_count, "folder count")?,
        }
        .write_le(&mut out)?;
        (file_table as u64).write_le(&mut out)?;
        (hash_table as u64).write_le(&mut out)?;

        let mut folder_pos = folders_start;
        for size in &folder_sizes {
            (folder_pos as u64).write_le(&mut out)?;
            folder_pos += size;
        }

        for folder in &self.folders {
            for file in &folder.files {
                hash_path(&format!("{}{}", folder.path, file.name)).write_le(&mut out)?;
            }
        }

        let mut file_index = 0u32;
        for folder in &self.folders {
            FolderHeader {
                hash: fnv1a64(folder.path.as_bytes()),
                content_count: to_u32(folder.files.len(), "folder size")?,
                reserved: 0,
            }
            .write_le(&mut out)?;
            for file in &folder.files {
                FolderEntry {
                    hash: fnv1a64(file.name.as_bytes()),
                    file_index,
                    reserved: 0,
                }
                .write_le(&mut out)?;
                file_index += 1;
            }
        }

        let mut payload_pos = payload_start;
        let files = self.folders.iter().flat_map(|f| f.files.iter());
        for (file, payload) in files.zip(&payloads) {
            FileHeader {
                level: file.level,
                compression_tag: file.compression.as_raw(),
                buffer_size: to_u32(file.data.len(), "file size")?,
                file_size: to_u32(payload.len(), "payload size")?,
                reserved: 0,
                file_pointer: payload_pos as u64,
            }
            .write_le(&mut out)?;
            payload_pos += payload.len();
        }

        let mut bytes = out.into_inner();
        for payload in &payloads {
            bytes.extend_from_slice(payload);
        }
        Ok(bytes)
    }
}

fn to_u32(value: usize, what: &str) -> GfpakResult<u32> {
    u32::try_from(value).map_err(|_| GfpakError::TooLarge(format!("{what} {value} exceeds u32")))
}
