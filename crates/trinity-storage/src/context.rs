//! Shared collaborators handed to every resolver

use crate::config::ResolverConfig;
use crate::hash_cache::HashCache;
use crate::Result;
use std::sync::Arc;
use trinity_formats::Decompressor;
use trinity_formats::flatbuffer::{Decoder, SchemaRegistry};

/// Configuration, schema registry, name cache and codecs used by a resolver
///
/// Cloning is cheap; every collaborator is reference counted, so several
/// resolvers can share one hash cache or one set of codecs.
#[derive(Debug, Clone)]
pub struct ArchiveContext {
    config: ResolverConfig,
    registry: Arc<SchemaRegistry>,
    hash_cache: Arc<HashCache>,
    decompressor: Arc<Decompressor>,
}

impl ArchiveContext {
    /// Default configuration, the built-in registry, an empty name cache and
    /// the built-in codecs
    pub fn new() -> Result<Self> {
        Ok(Self {
            config: ResolverConfig::default(),
            registry: Arc::new(SchemaRegistry::trinity()?),
            hash_cache: Arc::new(HashCache::new()),
            decompressor: Arc::new(Decompressor::new()),
        })
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing schema registry
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<SchemaRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Share an existing name cache
    #[must_use]
    pub fn with_hash_cache(mut self, hash_cache: Arc<HashCache>) -> Self {
        self.hash_cache = hash_cache;
        self
    }

    /// Use a codec set, typically one with an Oodle codec registered
    #[must_use]
    pub fn with_decompressor(mut self, decompressor: Decompressor) -> Self {
        self.decompressor = Arc::new(decompressor);
        self
    }

    /// Resolver configuration
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Schema registry
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Name cache
    pub const fn hash_cache(&self) -> &Arc<HashCache> {
        &self.hash_cache
    }

    /// Codec set
    pub fn decompressor(&self) -> &Decompressor {
        &self.decompressor
    }

    /// Decoder bounded by the configured nesting depth
    pub(crate) fn decoder(&self) -> Decoder<'_> {
        Decoder::new(&self.registry).with_max_depth(self.config.max_decode_depth)
    }
}
