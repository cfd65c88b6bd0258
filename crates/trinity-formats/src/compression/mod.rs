//! Decompression dispatch for archive payloads
//!
//! Payloads carry a [`CompressionTag`]. Stored payloads pass through
//! unchanged; every other tag is routed to a [`Codec`] that must produce
//! exactly the declared number of bytes.
//!
//! Zlib (`flate2`) and raw LZ4 blocks (`lz4_flex`) are built in. Oodle has
//! no Rust implementation, so callers that have one register it with
//! [`Decompressor::with_codec`]; without it, Oodle payloads fail with
//! [`DecompressionError::UnsupportedCodec`].

mod error;

pub use error::{DecompressionError, DecompressionResult};

use flate2::Compression;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use tracing::trace;

/// Maximum allowed decompression size (1 GiB)
///
/// Declared sizes come straight from archive headers, so this bounds the
/// allocation a forged header can request.
pub const MAX_DECOMPRESSION_SIZE: usize = 1024 * 1024 * 1024;

/// Payload compression kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum CompressionTag {
    /// Stored as-is
    None = 0,
    /// Zlib stream
    Zlib = 1,
    /// Raw LZ4 block
    Lz4 = 2,
    /// Oodle Kraken/Leviathan block
    Oodle = 3,
}

impl CompressionTag {
    /// Parse the on-disk tag
    pub const fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Zlib),
            2 => Some(Self::Lz4),
            3 => Some(Self::Oodle),
            _ => None,
        }
    }

    /// On-disk value
    pub const fn as_raw(self) -> u16 {
        self as u16
    }

    /// Whether payloads with this tag are stored uncompressed
    pub const fn is_stored(self) -> bool {
        matches!(self, Self::None)
    }
}

impl TryFrom<u16> for CompressionTag {
    type Error = DecompressionError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        Self::from_raw(raw).ok_or(DecompressionError::UnknownTag(raw))
    }
}

impl fmt::Display for CompressionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Zlib => "zlib",
            Self::Lz4 => "lz4",
            Self::Oodle => "oodle",
        };
        f.write_str(name)
    }
}

/// A block decompressor
pub trait Codec: Send + Sync + fmt::Debug {
    /// Short name for diagnostics
    fn name(&self) -> &'static str;

    /// Decompress `input`, which is expected to expand to `declared_size` bytes
    ///
    /// Implementations may return fewer or more bytes; the dispatcher rejects
    /// any length other than `declared_size`.
    fn decompress(&self, input: &[u8], declared_size: usize) -> DecompressionResult<Vec<u8>>;

    /// Compress `input` into this codec's format
    fn compress(&self, input: &[u8]) -> DecompressionResult<Vec<u8>> {
        let _ = input;
        Err(DecompressionError::CompressionUnsupported(self.name()))
    }
}

/// Zlib streams via `flate2`
#[derive(Debug, Clone, Copy, Default)]
pub struct ZlibCodec;

impl Codec for ZlibCodec {
    fn name(&self) -> &'static str {
        "zlib"
    }

    fn decompress(&self, input: &[u8], declared_size: usize) -> DecompressionResult<Vec<u8>> {
        // Read one byte past the declared size so oversized output is
        // reported as a mismatch instead of being silently cut.
        let limit = declared_size.saturating_add(1) as u64;
        let mut decoder = ZlibDecoder::new(input).take(limit);
        let mut decompressed = Vec::with_capacity(declared_size);
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| DecompressionError::codec(self.name(), e))?;
        Ok(decompressed)
    }

    fn compress(&self, input: &[u8]) -> DecompressionResult<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(input, Compression::default());
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| DecompressionError::codec(self.name(), e))?;
        Ok(compressed)
    }
}

/// Raw LZ4 blocks (no frame, no size prefix) via `lz4_flex`
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn decompress(&self, input: &[u8], declared_size: usize) -> DecompressionResult<Vec<u8>> {
        lz4_flex::block::decompress(input, declared_size)
            .map_err(|e| DecompressionError::codec(self.name(), e))
    }

    fn compress(&self, input: &[u8]) -> DecompressionResult<Vec<u8>> {
        Ok(lz4_flex::block::compress(input))
    }
}

/// Routes payloads to codecs by tag
#[derive(Debug, Clone)]
pub struct Decompressor {
    codecs: HashMap<CompressionTag, Arc<dyn Codec>>,
}

impl Default for Decompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor {
    /// Dispatcher with the built-in zlib and LZ4 codecs
    pub fn new() -> Self {
        let mut codecs: HashMap<CompressionTag, Arc<dyn Codec>> = HashMap::new();
        codecs.insert(CompressionTag::Zlib, Arc::new(ZlibCodec));
        codecs.insert(CompressionTag::Lz4, Arc::new(Lz4Codec));
        Self { codecs }
    }

    /// Register (or replace) the codec for `tag`
    ///
    /// Registering for [`CompressionTag::None`] has no effect; stored payloads
    /// never reach a codec.
    #[must_use]
    pub fn with_codec(mut self, tag: CompressionTag, codec: Arc<dyn Codec>) -> Self {
        if !tag.is_stored() {
            self.codecs.insert(tag, codec);
        }
        self
    }

    /// Whether a codec is available for `tag`
    pub fn supports(&self, tag: CompressionTag) -> bool {
        tag.is_stored() || self.codecs.contains_key(&tag)
    }

    /// Codec registered for `tag`
    pub fn codec(&self, tag: CompressionTag) -> Option<&Arc<dyn Codec>> {
        self.codecs.get(&tag)
    }

    /// Decompress `input` to exactly `declared_size` bytes
    pub fn decompress(
        &self,
        tag: CompressionTag,
        input: &[u8],
        declared_size: usize,
    ) -> DecompressionResult<Vec<u8>> {
        if tag.is_stored() {
            return Ok(input.to_vec());
        }
        if declared_size > MAX_DECOMPRESSION_SIZE {
            return Err(DecompressionError::TooLarge {
                size: declared_size,
                limit: MAX_DECOMPRESSION_SIZE,
            });
        }

        let codec = self
            .codecs
            .get(&tag)
            .ok_or(DecompressionError::UnsupportedCodec(tag))?;
        let output = codec.decompress(input, declared_size)?;
        trace!(
            "{} payload: {} -> {} bytes",
            tag,
            input.len(),
            output.len()
        );

        if output.len() != declared_size {
            return Err(DecompressionError::SizeMismatch {
                expected: declared_size,
                actual: output.len(),
            });
        }
        Ok(output)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    const TEXT: &[u8] = b"trinity trinity trinity trinity pack pack pack pack pack";

    #[test]
    fn test_stored_passthrough() {
        let out = Decompressor::new().decompress(CompressionTag::None, TEXT, 0).unwrap();
        assert_eq!(out, TEXT);
    }

    #[test]
    fn test_zlib_roundtrip() {
        let packed = ZlibCodec.compress(TEXT).unwrap();
        let out = Decompressor::new()
            .decompress(CompressionTag::Zlib, &packed, TEXT.len())
            .unwrap();
        assert_eq!(out, TEXT);
    }

    #[test]
    fn test_lz4_roundtrip() {
        let packed = Lz4Codec.compress(TEXT).unwrap();
        let out = Decompressor::new()
            .decompress(CompressionTag::Lz4, &packed, TEXT.len())
            .unwrap();
        assert_eq!(out, TEXT);
    }

    #[test]
    fn test_zlib_size_mismatch_is_an_error() {
        let packed = ZlibCodec.compress(TEXT).unwrap();
        let decompressor = Decompressor::new();

        let err = decompressor
            .decompress(CompressionTag::Zlib, &packed, TEXT.len() + 10)
            .unwrap_err();
        assert!(matches!(err, DecompressionError::SizeMismatch { actual, .. } if actual == TEXT.len()));

        let err = decompressor
            .decompress(CompressionTag::Zlib, &packed, TEXT.len() - 10)
            .unwrap_err();
        assert!(matches!(err, DecompressionError::SizeMismatch { .. }));
    }

    #[test]
    fn test_corrupt_input() {
        let err = Decompressor::new()
            .decompress(CompressionTag::Zlib, b"not zlib at all", 32)
            .unwrap_err();
        assert!(matches!(err, DecompressionError::Codec { codec: "zlib", .. }));
    }

    #[test]
    fn test_oodle_needs_registration() {
        let err = Decompressor::new()
            .decompress(CompressionTag::Oodle, TEXT, 100)
            .unwrap_err();
        assert!(matches!(err, DecompressionError::UnsupportedCodec(CompressionTag::Oodle)));
    }

    #[derive(Debug)]
    struct Reverse;

    impl Codec for Reverse {
        fn name(&self) -> &'static str {
            "reverse"
        }

        fn decompress(&self, input: &[u8], _declared_size: usize) -> DecompressionResult<Vec<u8>> {
            Ok(input.iter().rev().copied().collect())
        }
    }

    #[test]
    fn test_external_codec() {
        let decompressor = Decompressor::new().with_codec(CompressionTag::Oodle, Arc::new(Reverse));
        assert!(decompressor.supports(CompressionTag::Oodle));
        let out = decompressor.decompress(CompressionTag::Oodle, b"cba", 3).unwrap();
        assert_eq!(out, b"abc");
        assert!(matches!(
            Reverse.compress(b"abc"),
            Err(DecompressionError::CompressionUnsupported("reverse"))
        ));
    }

    #[test]
    fn test_declared_size_ceiling() {
        let err = Decompressor::new()
            .decompress(CompressionTag::Lz4, TEXT, MAX_DECOMPRESSION_SIZE + 1)
            .unwrap_err();
        assert!(matches!(err, DecompressionError::TooLarge { .. }));
    }

    #[test]
    fn test_tag_parsing() {
        assert_eq!(CompressionTag::from_raw(2), Some(CompressionTag::Lz4));
        assert!(CompressionTag::try_from(9).is_err());
        assert_eq!(CompressionTag::Oodle.as_raw(), 3);
    }
}
