//! Typed resource dictionary records for split (TRPFD/TRPFS) archives
//!
//! The descriptor (`data.trpfd`) maps file hashes to packs, the blob
//! (`data.trpfs`) starts with a [`OneFileHeader`] pointing at a
//! [`FilesystemIndex`] that maps pack-name hashes to blob offsets, and each
//! pack is a [`PackedArchive`] of [`PackedFile`] entries.

mod descriptor;
mod header;
mod pack;

pub use descriptor::{FileDescriptor, FileInfo, FilesystemIndex, PackInfo};
pub use header::{ONE_FILE_HEADER_SIZE, ONEFILE_MAGIC, OneFileHeader};
pub use pack::{PackedArchive, PackedFile, STORED_ENCRYPTION_TYPE};
