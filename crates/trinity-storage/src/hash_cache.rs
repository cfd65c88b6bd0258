//! Hash to name cache
//!
//! Archives only store FNV-1a hashes. The cache maps them back to readable
//! paths; it is seeded from hash lists, from `GFPAKHashCache.bin` files or by
//! the resolvers themselves when they can derive a name. It is never
//! authoritative: a missing name only means the file cannot be listed by
//! name, resolution by path or hash still works.
//!
//! Concurrent writers to the same hash race; the last write wins.
//!
//! # Binary format
//!
//! ```text
//! u64                  entry count
//! per entry:
//!   u64                hash
//!   7-bit varint       name length in bytes
//!   [u8]               UTF-8 name
//! ```

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::io::{self, BufRead, Read, Write};
use thiserror::Error;
use tracing::debug;
use trinity_formats::hash::hash_path;

/// Longest name accepted from a binary cache (the varint is a signed 32-bit length)
const MAX_NAME_LEN: u64 = i32::MAX as u64;

/// Errors from loading a binary hash cache
#[derive(Debug, Error)]
pub enum HashCacheError {
    /// Underlying reader or writer failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A length prefix was longer than five bytes or out of range
    #[error("Invalid name length at entry {entry}")]
    InvalidLength {
        /// Entry index
        entry: u64,
    },

    /// A name ended before its declared length
    #[error("Entry {entry} is truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Entry index
        entry: u64,
        /// Declared length
        expected: u64,
        /// Bytes available
        actual: u64,
    },

    /// A name was not valid UTF-8
    #[error("Entry {entry} is not valid UTF-8")]
    InvalidUtf8 {
        /// Entry index
        entry: u64,
    },
}

/// Concurrent `hash -> name` map
#[derive(Debug, Default)]
pub struct HashCache {
    names: DashMap<u64, String>,
}

impl HashCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `name` for `hash`, replacing any previous name
    pub fn insert(&self, hash: u64, name: impl Into<String>) {
        self.names.insert(hash, name.into());
    }

    /// Hash `path` and store it; returns the hash
    pub fn insert_path(&self, path: &str) -> u64 {
        let hash = hash_path(path);
        self.insert(hash, path);
        hash
    }

    /// Store `name` only if `hash` has no name yet; returns whether it was stored
    pub fn try_insert(&self, hash: u64, name: impl Into<String>) -> bool {
        let mut inserted = false;
        self.names.entry(hash).or_insert_with(|| {
            inserted = true;
            name.into()
        });
        inserted
    }

    /// Name recorded for `hash`
    pub fn name(&self, hash: u64) -> Option<String> {
        self.names.get(&hash).map(|name| name.value().clone())
    }

    /// Whether `hash` has a name
    pub fn contains(&self, hash: u64) -> bool {
        self.names.contains_key(&hash)
    }

    /// Number of names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Add entries without replacing existing names; returns how many were added
    pub fn merge<I, S>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (u64, S)>,
        S: Into<String>,
    {
        let mut added = 0;
        for (hash, name) in entries {
            if self.try_insert(hash, name) {
                added += 1;
            }
        }
        added
    }

    /// Every distinct name, sorted
    pub fn all_paths(&self) -> Vec<String> {
        self.names
            .iter()
            .map(|entry| entry.value().clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Load a text hash list; returns the number of entries read
    ///
    /// Each line is `<hash> <path>`, where the hash is hexadecimal with an
    /// optional `0x` prefix. When the first token is not hex, the second
    /// token is hashed instead. A line with a single token is a path to hash.
    /// Blank lines and lines starting with `#` are skipped.
    pub fn load_hash_list(&self, reader: impl BufRead) -> io::Result<usize> {
        let mut loaded = 0;
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut tokens = line.split_whitespace();
            let (Some(first), second) = (tokens.next(), tokens.next()) else {
                continue;
            };
            match second {
                None => {
                    self.insert_path(first);
                }
                Some(path) => match parse_hex(first) {
                    Some(hash) => self.insert(hash, path),
                    None => {
                        self.insert_path(path);
                    }
                },
            }
            loaded += 1;
        }
        debug!("Loaded {} hash list entries", loaded);
        Ok(loaded)
    }

    /// Load a binary cache; returns the number of entries read
    pub fn load_binary(&self, mut reader: impl Read) -> Result<u64, HashCacheError> {
        let count = read_u64(&mut reader)?;
        for entry in 0..count {
            let hash = read_u64(&mut reader)?;
            let len = read_varint(&mut reader, entry)?;
            if len > MAX_NAME_LEN {
                return Err(HashCacheError::InvalidLength { entry });
            }

            let mut bytes = Vec::new();
            let actual = (&mut reader).take(len).read_to_end(&mut bytes)? as u64;
            if actual != len {
                return Err(HashCacheError::Truncated {
                    entry,
                    expected: len,
                    actual,
                });
            }
            let name = String::from_utf8(bytes).map_err(|_| HashCacheError::InvalidUtf8 { entry })?;
            self.insert(hash, name);
        }
        debug!("Loaded {} binary hash cache entries", count);
        Ok(count)
    }

    /// Write every entry in the binary format, ordered by hash
    pub fn write_binary(&self, mut writer: impl Write) -> io::Result<()> {
        let mut entries: Vec<(u64, String)> = self
            .names
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        entries.sort_unstable_by_key(|(hash, _)| *hash);

        writer.write_all(&(entries.len() as u64).to_le_bytes())?;
        for (hash, name) in &entries {
            writer.write_all(&hash.to_le_bytes())?;
            write_varint(&mut writer, name.len() as u64)?;
            writer.write_all(name.as_bytes())?;
        }
        writer.flush()
    }
}

fn parse_hex(token: &str) -> Option<u64> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u64::from_str_radix(digits, 16).ok()
}

fn read_u64(reader: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_varint(reader: &mut impl Read, entry: u64) -> Result<u64, HashCacheError> {
    let mut value = 0u64;
    for shift in (0..35).step_by(7) {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;
        value |= u64::from(byte[0] & 0x7F) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(HashCacheError::InvalidLength { entry })
}

fn write_varint(writer: &mut impl Write, mut value: u64) -> io::Result<()> {
    while value >= 0x80 {
        writer.write_all(&[(value as u8) | 0x80])?;
        value >>= 7;
    }
    writer.write_all(&[value as u8])
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_insert_and_try_insert() {
        let cache = HashCache::new();
        cache.insert(1, "first");
        assert!(!cache.try_insert(1, "second"));
        assert_eq!(cache.name(1).as_deref(), Some("first"));
        assert!(cache.try_insert(2, "other"));
        assert_eq!(cache.len(), 2);

        cache.insert(1, "replaced");
        assert_eq!(cache.name(1).as_deref(), Some("replaced"));
    }

    #[test]
    fn test_insert_path_normalizes_hash() {
        let cache = HashCache::new();
        let hash = cache.insert_path("/arc/pokemon/pm0001.trmdl");
        assert_eq!(hash, hash_path("arc/pokemon/pm0001.trmdl"));
        assert!(cache.contains(hash));
    }

    #[test]
    fn test_merge_keeps_existing() {
        let cache = HashCache::new();
        cache.insert(1, "kept");
        let added = cache.merge([(1, "dropped"), (2, "new"), (3, "new")]);
        assert_eq!(added, 2);
        assert_eq!(cache.name(1).as_deref(), Some("kept"));
        assert_eq!(cache.all_paths(), vec!["kept".to_string(), "new".to_string()]);
    }

    #[test]
    fn test_hash_list_formats() {
        let list = "\
# comment line
0x00000000000000FF  arc/explicit.bin
abc arc/bare_hex.bin
not-hex arc/hashed.bin

arc/single.bin
";
        let cache = HashCache::new();
        let loaded = cache.load_hash_list(Cursor::new(list)).unwrap();
        assert_eq!(loaded, 4);
        assert_eq!(cache.name(0xFF).as_deref(), Some("arc/explicit.bin"));
        assert_eq!(cache.name(0xABC).as_deref(), Some("arc/bare_hex.bin"));
        assert_eq!(cache.name(hash_path("arc/hashed.bin")).as_deref(), Some("arc/hashed.bin"));
        assert_eq!(cache.name(hash_path("arc/single.bin")).as_deref(), Some("arc/single.bin"));
    }

    #[test]
    fn test_binary_roundtrip() {
        let cache = HashCache::new();
        cache.insert(7, "a");
        cache.insert(3, "pokemon/データ.bin");
        cache.insert(9, "x".repeat(300));

        let mut out = Vec::new();
        cache.write_binary(&mut out).unwrap();
        // 300 needs a two byte length prefix
        assert_eq!(out.len(), 8 + (8 + 1 + 1) + (8 + 1 + "pokemon/データ.bin".len()) + (8 + 2 + 300));

        let loaded = HashCache::new();
        assert_eq!(loaded.load_binary(out.as_slice()).unwrap(), 3);
        assert_eq!(loaded.name(3).as_deref(), Some("pokemon/データ.bin"));
        assert_eq!(loaded.name(9).unwrap().len(), 300);
    }

    #[test]
    fn test_binary_errors() {
        let cache = HashCache::new();
        cache.insert(1, "name");
        let mut out = Vec::new();
        cache.write_binary(&mut out).unwrap();

        let truncated = &out[..out.len() - 1];
        assert!(matches!(
            HashCache::new().load_binary(truncated),
            Err(HashCacheError::Truncated { entry: 0, expected: 4, actual: 3 })
        ));

        let mut bad_utf8 = out.clone();
        let last = bad_utf8.len() - 1;
        bad_utf8[last] = 0xFF;
        assert!(matches!(
            HashCache::new().load_binary(bad_utf8.as_slice()),
            Err(HashCacheError::InvalidUtf8 { entry: 0 })
        ));

        let mut endless = Vec::new();
        endless.extend_from_slice(&1u64.to_le_bytes());
        endless.extend_from_slice(&1u64.to_le_bytes());
        endless.extend_from_slice(&[0xFF; 6]);
        assert!(matches!(
            HashCache::new().load_binary(endless.as_slice()),
            Err(HashCacheError::InvalidLength { entry: 0 })
        ));
    }
}
