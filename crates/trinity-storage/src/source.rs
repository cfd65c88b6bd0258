//! Archive bytes backed by a memory map or an owned buffer

use memmap2::{Mmap, MmapOptions};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::debug;

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

/// Read-only bytes of an archive file, held for the resolver's lifetime
pub struct ArchiveSource {
    path: PathBuf,
    backing: Backing,
}

impl ArchiveSource {
    /// Open `path`, mapping it when `use_mmap` is set
    ///
    /// Empty files are always read, since zero-length maps are not portable.
    pub fn open(path: impl AsRef<Path>, use_mmap: bool) -> std::io::Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let size = file.metadata()?.len();

        let backing = if use_mmap && size > 0 {
            // The archive is opened read-only and never written while mapped
            #[allow(unsafe_code)]
            let mmap = unsafe { MmapOptions::new().map(&file)? };
            Backing::Mapped(mmap)
        } else {
            let mut data = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
            file.read_to_end(&mut data)?;
            Backing::Owned(data)
        };

        debug!(
            "Opened {} ({} bytes, {})",
            path.display(),
            size,
            if matches!(backing, Backing::Mapped(_)) { "mapped" } else { "read" }
        );

        Ok(Self {
            path: path.to_path_buf(),
            backing,
        })
    }

    /// Wrap bytes already in memory
    pub fn from_bytes(path: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            backing: Backing::Owned(data),
        }
    }

    /// File this source was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the bytes come from a memory map
    pub const fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    /// The archive bytes
    pub fn as_bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(mmap) => &mmap[..],
            Backing::Owned(data) => data.as_slice(),
        }
    }
}

impl Deref for ArchiveSource {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for ArchiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveSource")
            .field("path", &self.path)
            .field("len", &self.as_bytes().len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}
