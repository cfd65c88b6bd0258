//! 64-bit FNV-1a path hashing
//!
//! Trinity archives address every file, folder and pack by the FNV-1a hash of
//! its name. The basis used by the games is `0xCBF29CE484222645`, which is
//! *not* the published FNV-1a offset basis (`0xCBF29CE484222325`). Archives
//! only resolve with the former.
//!
//! Paths must go through [`normalize_path`] before hashing; [`hash_path`] does
//! both. Pack names stored inside descriptors are hashed verbatim with
//! [`fnv1a64`].

use std::fmt;

/// FNV-1a basis as used by the game's tooling
pub const FNV_BASIS: u64 = 0xCBF2_9CE4_8422_2645;

/// 64-bit FNV prime
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

/// Fold `bytes` into a 64-bit FNV-1a hash
///
/// ```
/// use trinity_formats::hash::{fnv1a64, FNV_BASIS};
///
/// assert_eq!(fnv1a64(b""), FNV_BASIS);
/// ```
pub const fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut acc = FNV_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        acc ^= bytes[i] as u64;
        acc = acc.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    acc
}

/// Normalize a romfs-relative path into the form the archives hash
///
/// Backslashes become forward slashes, surrounding whitespace is trimmed, a
/// single `scheme://` prefix (such as `romfs://` or `trpfs://`) is removed and
/// all leading slashes are stripped.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let trimmed = unified.trim();
    let without_scheme = strip_scheme(trimmed);
    without_scheme.trim_start_matches('/').to_string()
}

fn strip_scheme(path: &str) -> &str {
    match path.find("://") {
        Some(pos) if pos > 0 && path[..pos].bytes().all(|b| b.is_ascii_alphanumeric()) => {
            &path[pos + 3..]
        }
        _ => path,
    }
}

/// Normalize `path` and hash the result
pub fn hash_path(path: &str) -> u64 {
    fnv1a64(normalize_path(path).as_bytes())
}

/// Lookup key accepted by the resolvers: a path to normalize and hash, or an
/// already computed hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKey<'a> {
    /// A romfs-relative path
    Path(&'a str),
    /// A precomputed FNV-1a hash
    Hash(u64),
}

impl AssetKey<'_> {
    /// Hash used for the index lookup
    pub fn hash(&self) -> u64 {
        match self {
            Self::Path(path) => hash_path(path),
            Self::Hash(hash) => *hash,
        }
    }

    /// The path, if this key was built from one
    pub const fn path(&self) -> Option<&str> {
        match self {
            Self::Path(path) => Some(path),
            Self::Hash(_) => None,
        }
    }
}

impl<'a> From<&'a str> for AssetKey<'a> {
    fn from(path: &'a str) -> Self {
        Self::Path(path)
    }
}

impl<'a> From<&'a String> for AssetKey<'a> {
    fn from(path: &'a String) -> Self {
        Self::Path(path.as_str())
    }
}

impl From<u64> for AssetKey<'_> {
    fn from(hash: u64) -> Self {
        Self::Hash(hash)
    }
}

impl fmt::Display for AssetKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.write_str(path),
            Self::Hash(hash) => write!(f, "{hash:016X}"),
        }
    }
}
