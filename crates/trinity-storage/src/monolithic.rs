//! GFLXPACK resolver
//!
//! Parses the archive tables once at open and keeps the file mapped. Each
//! `extract` is a hash lookup in the file table followed by decompression
//! of one payload.
//!
//! Names are derived the way the archive tooling does: the cached name of the
//! full-path hash if known, otherwise the cached folder name followed by the
//! cached file name, with `{:016X}` standing in for any unknown part.

use crate::context::ArchiveContext;
use crate::{AssetKey, AssetResolver, Result, has_extension, open_source};
use crate::source::ArchiveSource;
use std::path::Path;
use tracing::{debug, info};
use trinity_formats::gfpak::GfpakIndex;
use trinity_formats::hash::normalize_path;

/// A file listed by [`MonolithicArchive::files`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonolithicFile {
    /// Full-path hash
    pub hash: u64,
    /// Position in the file table
    pub file_index: usize,
    /// Folder path, or its hash in hex
    pub folder: String,
    /// Full path, or a name built from hex placeholders
    pub name: String,
}

/// Folder and entry positions naming a file
#[derive(Debug, Clone, Copy)]
struct Owner {
    folder: usize,
    entry: usize,
}

/// Open GFLXPACK archive
#[derive(Debug)]
pub struct MonolithicArchive {
    source: ArchiveSource,
    index: GfpakIndex,
    /// Per file index, the first folder entry that names it
    owners: Vec<Option<Owner>>,
    context: ArchiveContext,
}

impl MonolithicArchive {
    /// Open with default settings
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &ArchiveContext::new()?)
    }

    /// Open sharing `context`'s configuration, name cache and codecs
    pub fn open_with(path: impl AsRef<Path>, context: &ArchiveContext) -> Result<Self> {
        let path = path.as_ref();
        let source = open_source(path, context.config().use_mmap)?;
        let archive = Self::from_source(source, context)?;
        info!(
            "Opened GFLXPACK {}: {} files in {} folders",
            path.display(),
            archive.file_count(),
            archive.folder_count()
        );
        Ok(archive)
    }

    /// Parse an archive already in memory
    pub fn from_source(source: ArchiveSource, context: &ArchiveContext) -> Result<Self> {
        let index = GfpakIndex::parse(&source)?;

        let mut owners = vec![None; index.file_count()];
        for (folder_pos, folder) in index.folders().iter().enumerate() {
            for (entry_pos, entry) in folder.entries.iter().enumerate() {
                if let Some(slot) = owners.get_mut(entry.file_index as usize)
                    && slot.is_none()
                {
                    *slot = Some(Owner {
                        folder: folder_pos,
                        entry: entry_pos,
                    });
                }
            }
        }

        Ok(Self {
            source,
            index,
            owners,
            context: context.clone(),
        })
    }

    /// Decompressed bytes of `key`, or `None` if the archive does not hold it
    ///
    /// The first successful extraction of a file whose hash has no cached
    /// name records one: the requested path when extracting by path,
    /// otherwise the name derived from the folder tree when it contains no
    /// placeholders.
    pub fn extract(&self, key: AssetKey<'_>) -> Result<Option<Vec<u8>>> {
        let hash = key.hash();
        let Some(file_index) = self.index.find(hash) else {
            debug!("{} ({:016X}) not in {}", key, hash, self.source.path().display());
            return Ok(None);
        };

        let data = self
            .index
            .extract(&self.source, file_index, self.context.decompressor())?;

        let cache = self.context.hash_cache();
        if !cache.contains(hash) {
            let name = match key.path() {
                Some(path) => Some(normalize_path(path)),
                None => self.derived_name(file_index),
            };
            if let Some(name) = name {
                debug!("Registered name {} for {:016X}", name, hash);
                cache.try_insert(hash, name);
            }
        }
        Ok(Some(data))
    }

    /// Every file with its best known name, in file-table order
    pub fn files(&self) -> Vec<MonolithicFile> {
        (0..self.index.file_count())
            .map(|file_index| {
                let hash = self.index.file_hashes()[file_index];
                let folder = self
                    .owner_hashes(file_index)
                    .map(|(folder, _)| self.name_or_hex(folder))
                    .unwrap_or_default();
                let name = self.display_name(file_index);
                MonolithicFile {
                    hash,
                    file_index,
                    folder,
                    name,
                }
            })
            .collect()
    }

    /// Number of files
    pub fn file_count(&self) -> usize {
        self.index.file_count()
    }

    /// Number of folders
    pub fn folder_count(&self) -> usize {
        self.index.folder_count()
    }

    /// Parsed archive tables
    pub const fn index(&self) -> &GfpakIndex {
        &self.index
    }

    /// Underlying archive bytes
    pub const fn source(&self) -> &ArchiveSource {
        &self.source
    }

    /// Collaborators this archive was opened with
    pub const fn context(&self) -> &ArchiveContext {
        &self.context
    }

    /// Folder hash and file-name hash of the entry naming `file_index`
    fn owner_hashes(&self, file_index: usize) -> Option<(u64, u64)> {
        let owner = self.owners.get(file_index).copied().flatten()?;
        let folder = self.index.folders().get(owner.folder)?;
        let entry = folder.entries.get(owner.entry)?;
        Some((folder.hash, entry.hash))
    }

    /// Cached full name, or folder + file name when both are cached
    fn derived_name(&self, file_index: usize) -> Option<String> {
        let cache = self.context.hash_cache();
        let hash = *self.index.file_hashes().get(file_index)?;
        if let Some(name) = cache.name(hash) {
            return Some(name);
        }
        let (folder, file) = self.owner_hashes(file_index)?;
        Some(format!("{}{}", cache.name(folder)?, cache.name(file)?))
    }

    /// Best name for listing, falling back to hex placeholders
    fn display_name(&self, file_index: usize) -> String {
        if let Some(name) = self.derived_name(file_index) {
            return name;
        }
        match self.owner_hashes(file_index) {
            Some((folder, file)) => format!("{}{}", self.name_or_hex(folder), self.name_or_hex(file)),
            None => format!("{:016X}", self.index.file_hashes()[file_index]),
        }
    }

    fn name_or_hex(&self, hash: u64) -> String {
        self.context
            .hash_cache()
            .name(hash)
            .unwrap_or_else(|| format!("{hash:016X}"))
    }
}

impl AssetResolver for MonolithicArchive {
    fn extract(&self, key: AssetKey<'_>) -> Result<Option<Vec<u8>>> {
        Self::extract(self, key)
    }

    fn find_by_extension(&self, extension: &str) -> Vec<(u64, String)> {
        (0..self.index.file_count())
            .filter_map(|file_index| {
                let name = self.derived_name(file_index)?;
                has_extension(&name, extension).then(|| (self.index.file_hashes()[file_index], name))
            })
            .collect()
    }
}
