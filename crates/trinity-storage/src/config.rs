//! Configuration for archive resolvers

use serde::{Deserialize, Serialize};
use trinity_formats::flatbuffer::DEFAULT_MAX_DEPTH;

/// Configuration shared by the monolithic and split resolvers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Map archives into memory instead of reading them fully
    pub use_mmap: bool,

    /// Byte budget for decoded packs; `None` keeps every pack until the
    /// resolver is dropped
    pub pack_cache_budget: Option<usize>,

    /// Maximum nesting depth accepted by the record decoder
    pub max_decode_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            use_mmap: true,
            pack_cache_budget: None,
            max_decode_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ResolverConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable memory mapping
    #[must_use]
    pub const fn with_mmap(mut self, enable: bool) -> Self {
        self.use_mmap = enable;
        self
    }

    /// Bound the pack cache to `bytes` of decoded payload
    #[must_use]
    pub const fn with_pack_cache_budget(mut self, bytes: usize) -> Self {
        self.pack_cache_budget = Some(bytes);
        self
    }

    /// Keep every decoded pack
    #[must_use]
    pub const fn with_unbounded_pack_cache(mut self) -> Self {
        self.pack_cache_budget = None;
        self
    }

    /// Set the decoder nesting limit
    #[must_use]
    pub const fn with_max_decode_depth(mut self, depth: usize) -> Self {
        self.max_decode_depth = depth;
        self
    }
}
