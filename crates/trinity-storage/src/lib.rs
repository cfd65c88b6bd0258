//! Asset resolution over Trinity engine game archives.
//!
//! Two archive families are supported, both addressed purely by FNV-1a path
//! hashes so no filesystem tree is ever materialized:
//!
//! - **Monolithic** (`.trpak` / `.gfpak`): a single GFLXPACK file with a
//!   folder tree and a flat file table, see [`MonolithicArchive`]
//! - **Split** (`data.trpfd` + `data.trpfs`): a descriptor mapping file hashes
//!   to packs and a blob holding the packs, located through an embedded
//!   filesystem index, see [`SplitArchive`]
//!
//! Lookups that miss at any hop return `Ok(None)` so bulk extraction can skip
//! absent assets. Corrupt data and codec failures are errors.
//!
//! # Example
//!
//! ```rust,no_run
//! use trinity_storage::{AssetKey, AssetResolver, open_split};
//!
//! # fn example() -> trinity_storage::Result<()> {
//! let archive = open_split("romfs/arc/data.trpfd", "romfs/arc/data.trpfs")?;
//! let path = "pokemon/data/pm0025/pm0025_00_00/pm0025_00_00.trmdl";
//! if let Some(bytes) = archive.extract(AssetKey::Path(path))? {
//!     println!("{} bytes", bytes.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use std::path::{Path, PathBuf};
use thiserror::Error;
use trinity_formats::compression::DecompressionError;
use trinity_formats::cursor::OutOfBounds;
use trinity_formats::flatbuffer::{DecodeError, SchemaId};
use trinity_formats::gfpak::GfpakError;

// Resolver configuration
pub mod config;

// Shared resolver collaborators
pub mod context;

// Hash to name cache
pub mod hash_cache;

// Decoded pack memo
pub mod pack_cache;

// Archive file access
pub mod source;

// GFLXPACK resolver
pub mod monolithic;

// TRPFD/TRPFS resolver
pub mod split;

pub use config::ResolverConfig;
pub use context::ArchiveContext;
pub use hash_cache::{HashCache, HashCacheError};
pub use monolithic::{MonolithicArchive, MonolithicFile};
pub use pack_cache::{CachedPack, PackCache};
pub use source::ArchiveSource;
pub use split::SplitArchive;
pub use trinity_formats::AssetKey;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while opening archives or resolving assets.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Bad magic or an inconsistent header.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// A table, record or payload lies outside its buffer.
    #[error("Offset out of range: {0}")]
    OffsetOutOfRange(String),

    /// A record type has no registered layout.
    #[error("Unknown schema: {0}")]
    UnknownSchema(SchemaId),

    /// Records nest deeper than the configured limit.
    #[error("Schema nesting deeper than {limit} levels")]
    SchemaTooDeep {
        /// Configured limit
        limit: usize,
    },

    /// A required asset is absent from every index.
    #[error("Hash not found: {0:016X}")]
    HashNotFound(u64),

    /// A descriptor row names a pack that does not exist.
    #[error("File {file_hash:016X} references pack {pack_index}, descriptor has {pack_count} packs")]
    DanglingPackIndex {
        /// File being resolved
        file_hash: u64,
        /// Referenced pack index
        pack_index: u64,
        /// Number of packs covered by both pack tables
        pack_count: usize,
    },

    /// Codec failure or a payload that did not match its declared size.
    #[error("Decompression failed: {0}")]
    DecompressionFailure(#[from] DecompressionError),

    /// A record decoded but did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(DecodeError),

    /// GFLXPACK error without a more specific category.
    #[error("GFLXPACK error: {0}")]
    Gfpak(GfpakError),

    /// Binary hash cache could not be loaded.
    #[error("Hash cache error: {0}")]
    HashCache(#[from] HashCacheError),

    /// An archive file could not be opened.
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether the error means "absent" rather than "broken"
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::HashNotFound(_))
    }

    /// Whether the error indicates corrupt archive data
    pub const fn is_corruption(&self) -> bool {
        match self {
            Self::Decode(err) => err.is_corrupt_input(),
            _ => matches!(
                self,
                Self::MalformedHeader(_)
                    | Self::OffsetOutOfRange(_)
                    | Self::SchemaTooDeep { .. }
                    | Self::DanglingPackIndex { .. }
                    | Self::DecompressionFailure(_)
            ),
        }
    }
}

impl From<OutOfBounds> for StorageError {
    fn from(err: OutOfBounds) -> Self {
        Self::OffsetOutOfRange(err.to_string())
    }
}

impl From<DecodeError> for StorageError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::OffsetOutOfRange(bounds) => bounds.into(),
            DecodeError::BadOffset { .. } => Self::OffsetOutOfRange(err.to_string()),
            DecodeError::UnknownSchema(id) => Self::UnknownSchema(id),
            DecodeError::SchemaTooDeep { limit } => Self::SchemaTooDeep { limit },
            other => Self::Decode(other),
        }
    }
}

impl From<GfpakError> for StorageError {
    fn from(err: GfpakError) -> Self {
        match err {
            GfpakError::MalformedHeader { reason } => Self::MalformedHeader(reason),
            GfpakError::OffsetOutOfRange(bounds) => bounds.into(),
            GfpakError::FileIndexOutOfRange { .. } => Self::OffsetOutOfRange(err.to_string()),
            GfpakError::Decompression(inner) => Self::DecompressionFailure(inner),
            other => Self::Gfpak(other),
        }
    }
}

/// Common interface of the monolithic and split resolvers
pub trait AssetResolver: Send + Sync {
    /// Bytes of the asset, or `None` if any index hop misses
    fn extract(&self, key: AssetKey<'_>) -> Result<Option<Vec<u8>>>;

    /// Named files whose name ends with `extension` (ASCII case-insensitive)
    ///
    /// Only files with a known name are listed, so this depends on how well
    /// the hash cache is populated.
    fn find_by_extension(&self, extension: &str) -> Vec<(u64, String)>;

    /// Like [`AssetResolver::extract`], with a miss reported as
    /// [`StorageError::HashNotFound`]
    fn read(&self, key: AssetKey<'_>) -> Result<Vec<u8>> {
        let hash = key.hash();
        self.extract(key)?.ok_or(StorageError::HashNotFound(hash))
    }
}

/// Open a GFLXPACK archive with default settings
pub fn open_monolithic(path: impl AsRef<Path>) -> Result<MonolithicArchive> {
    MonolithicArchive::open(path)
}

/// Open a descriptor and blob pair with default settings
pub fn open_split(descriptor: impl AsRef<Path>, blob: impl AsRef<Path>) -> Result<SplitArchive> {
    SplitArchive::open(descriptor, blob)
}

/// Whether `name` ends with `extension`, ignoring ASCII case
pub(crate) fn has_extension(name: &str, extension: &str) -> bool {
    let (name, extension) = (name.as_bytes(), extension.as_bytes());
    name.len() >= extension.len() && name[name.len() - extension.len()..].eq_ignore_ascii_case(extension)
}

/// Open `path` as an archive source, attaching the path to failures
pub(crate) fn open_source(path: &Path, use_mmap: bool) -> Result<ArchiveSource> {
    ArchiveSource::open(path, use_mmap).map_err(|source| StorageError::Open {
        path: path.to_path_buf(),
        source,
    })
}
