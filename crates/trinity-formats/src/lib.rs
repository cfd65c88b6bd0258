//! Binary formats of Trinity engine game archives
//!
#![allow(clippy::cast_possible_wrap)] // Offsets are reinterpreted between signed and unsigned
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::float_cmp)] // Round-trip tests compare exact bit patterns
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::use_self)] // Type clarity
//! This crate is pure: it parses and builds caller-supplied byte buffers and
//! never touches the filesystem. Archive access built on top of it lives in
//! `trinity-storage`.
//!
//! # Modules
//!
//! - **cursor**: bounds-checked little-endian reads at absolute offsets
//! - **hash**: FNV-1a 64 path hashing with path normalization
//! - **flatbuffer**: schema registry, generic decoder and reference encoder
//!   for the FlatBuffer-encoded resource files
//! - **resource**: typed records of the split archive resource dictionary
//!   (descriptor, filesystem index, packs)
//! - **gfpak**: the GFLXPACK monolithic archive format, parser and builder
//! - **compression**: payload decompression dispatch (zlib, LZ4, external
//!   Oodle)
//!
//! # Design Principles
//!
//! - **No panics on input**: every offset read from a file is bounds-checked
//!   and reported as an error
//! - **Symmetric Operations**: every format that is parsed can also be built,
//!   which is how the tests produce their fixtures
//! - **Explicit schemas**: layouts live in an immutable registry passed by
//!   reference, never in global state

#![warn(missing_docs)]

pub mod compression;
pub mod cursor;
pub mod flatbuffer;
pub mod gfpak;
pub mod hash;
pub mod resource;

pub use compression::{CompressionTag, Decompressor};
pub use hash::{AssetKey, hash_path};
