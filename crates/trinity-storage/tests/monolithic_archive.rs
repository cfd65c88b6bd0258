#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! GFLXPACK resolution from archives on disk

use pretty_assertions::assert_eq;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use trinity_formats::compression::{Codec, DecompressionResult};
use trinity_formats::gfpak::GfpakBuilder;
use trinity_formats::hash::{fnv1a64, hash_path};
use trinity_formats::{CompressionTag, Decompressor};
use trinity_storage::{
    ArchiveContext, AssetKey, AssetResolver, HashCache, MonolithicArchive, ResolverConfig,
    StorageError,
};

/// Xor "compression" registered in place of the proprietary codec
#[derive(Debug)]
struct XorCodec;

impl Codec for XorCodec {
    fn name(&self) -> &'static str {
        "xor"
    }

    fn decompress(&self, input: &[u8], _declared_size: usize) -> DecompressionResult<Vec<u8>> {
        Ok(input.iter().map(|b| b ^ 0x5A).collect())
    }

    fn compress(&self, input: &[u8]) -> DecompressionResult<Vec<u8>> {
        Ok(input.iter().map(|b| b ^ 0x5A).collect())
    }
}

fn codecs() -> Decompressor {
    Decompressor::new().with_codec(CompressionTag::Oodle, Arc::new(XorCodec))
}

fn write_archive(dir: &Path) -> std::path::PathBuf {
    let mut builder = GfpakBuilder::new();
    builder
        .add_file("pokemon/pm0025/", "pm0025.trmdl", b"pikachu model".to_vec(), CompressionTag::Zlib)
        .add_file("pokemon/pm0025/", "pm0025.trmsh", b"pikachu mesh".to_vec(), CompressionTag::Lz4)
        .add_file("pokemon/pm0025/", "pm0025.trskl", b"pikachu skeleton".to_vec(), CompressionTag::Oodle)
        .add_file("field/", "area01.trmdl", vec![7u8; 4096], CompressionTag::None);
    let path = dir.join("pm0025.trpak");
    std::fs::write(&path, builder.build_with(&codecs()).unwrap()).unwrap();
    path
}

fn context() -> ArchiveContext {
    ArchiveContext::new().unwrap().with_decompressor(codecs())
}

// --- opening ---

#[test]
fn test_open_mapped_and_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(dir.path());

    for use_mmap in [true, false] {
        let context = context().with_config(ResolverConfig::default().with_mmap(use_mmap));
        let archive = MonolithicArchive::open_with(&path, &context).unwrap();
        assert_eq!(archive.source().is_mapped(), use_mmap);
        assert_eq!(archive.file_count(), 4);
        assert_eq!(archive.folder_count(), 2);
        assert_eq!(
            archive
                .extract(AssetKey::Path("pokemon/pm0025/pm0025.trmdl"))
                .unwrap()
                .as_deref(),
            Some(b"pikachu model".as_slice())
        );
    }
}

#[test]
fn test_open_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = trinity_storage::open_monolithic(dir.path().join("absent.trpak")).unwrap_err();
    assert!(matches!(err, StorageError::Open { .. }), "{err}");
}

#[test]
fn test_open_bad_magic() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(dir.path());
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[..8].copy_from_slice(b"NOTAPACK");
    std::fs::write(&path, bytes).unwrap();

    let err = MonolithicArchive::open(&path).unwrap_err();
    assert!(matches!(err, StorageError::MalformedHeader(_)), "{err}");
    assert!(err.is_corruption());
}

// --- extraction ---

#[test]
fn test_every_codec_resolves() {
    let dir = tempfile::tempdir().unwrap();
    let archive = MonolithicArchive::open_with(write_archive(dir.path()), &context()).unwrap();

    let cases: [(&str, &[u8]); 4] = [
        ("pokemon/pm0025/pm0025.trmdl", b"pikachu model"),
        ("pokemon/pm0025/pm0025.trmsh", b"pikachu mesh"),
        ("pokemon/pm0025/pm0025.trskl", b"pikachu skeleton"),
        ("field/area01.trmdl", &[7u8; 4096]),
    ];
    for (path, expected) in cases {
        assert_eq!(archive.read(AssetKey::Path(path)).unwrap(), expected, "{path}");
    }
}

#[test]
fn test_missing_codec_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let archive = MonolithicArchive::open(write_archive(dir.path())).unwrap();
    let err = archive
        .extract(AssetKey::Path("pokemon/pm0025/pm0025.trskl"))
        .unwrap_err();
    assert!(matches!(err, StorageError::DecompressionFailure(_)), "{err}");
}

#[test]
fn test_absent_asset() {
    let dir = tempfile::tempdir().unwrap();
    let archive = MonolithicArchive::open_with(write_archive(dir.path()), &context()).unwrap();
    let key = AssetKey::Path("pokemon/pm0026/pm0026.trmdl");

    assert_eq!(archive.extract(key).unwrap(), None);
    let err = archive.read(key).unwrap_err();
    assert!(matches!(err, StorageError::HashNotFound(h) if h == hash_path("pokemon/pm0026/pm0026.trmdl")));
}

// --- names ---

#[test]
fn test_extraction_registers_names() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(HashCache::new());
    let context = context().with_hash_cache(Arc::clone(&cache));
    let archive = MonolithicArchive::open_with(write_archive(dir.path()), &context).unwrap();

    // By path: the normalized request is recorded
    archive
        .extract(AssetKey::Path("romfs://pokemon/pm0025/pm0025.trmdl"))
        .unwrap()
        .unwrap();
    assert_eq!(
        cache.name(hash_path("pokemon/pm0025/pm0025.trmdl")).as_deref(),
        Some("pokemon/pm0025/pm0025.trmdl")
    );

    // By hash: recorded once the folder and file names are known
    let mesh = hash_path("pokemon/pm0025/pm0025.trmsh");
    archive.extract(AssetKey::Hash(mesh)).unwrap().unwrap();
    assert!(!cache.contains(mesh));

    cache.insert(fnv1a64(b"pokemon/pm0025/"), "pokemon/pm0025/");
    cache.insert(fnv1a64(b"pm0025.trmsh"), "pm0025.trmsh");
    archive.extract(AssetKey::Hash(mesh)).unwrap().unwrap();
    assert_eq!(cache.name(mesh).as_deref(), Some("pokemon/pm0025/pm0025.trmsh"));
}

#[test]
fn test_registered_name_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(HashCache::new());
    let hash = hash_path("field/area01.trmdl");
    cache.insert(hash, "custom/name.trmdl");
    let context = context().with_hash_cache(Arc::clone(&cache));
    let archive = MonolithicArchive::open_with(write_archive(dir.path()), &context).unwrap();

    archive.extract(AssetKey::Path("field/area01.trmdl")).unwrap().unwrap();
    assert_eq!(cache.name(hash).as_deref(), Some("custom/name.trmdl"));
}

#[test]
fn test_find_by_extension_and_listing() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(HashCache::new());
    let context = context().with_hash_cache(Arc::clone(&cache));
    let archive = MonolithicArchive::open_with(write_archive(dir.path()), &context).unwrap();
    let resolver: &dyn AssetResolver = &archive;

    assert!(resolver.find_by_extension(".trmdl").is_empty());

    cache
        .load_hash_list(Cursor::new("pokemon/pm0025/pm0025.trmdl\nfield/area01.trmdl\n"))
        .unwrap();
    cache.insert(fnv1a64(b"pokemon/pm0025/"), "pokemon/pm0025/");

    let mut found = resolver.find_by_extension(".TRMDL");
    found.sort_by(|a, b| a.1.cmp(&b.1));
    assert_eq!(
        found,
        vec![
            (hash_path("field/area01.trmdl"), "field/area01.trmdl".to_string()),
            (
                hash_path("pokemon/pm0025/pm0025.trmdl"),
                "pokemon/pm0025/pm0025.trmdl".to_string()
            ),
        ]
    );

    let files = archive.files();
    assert_eq!(files.len(), 4);
    let skeleton = files
        .iter()
        .find(|f| f.hash == hash_path("pokemon/pm0025/pm0025.trskl"))
        .unwrap();
    assert_eq!(skeleton.folder, "pokemon/pm0025/");
    assert_eq!(
        skeleton.name,
        format!("pokemon/pm0025/{:016X}", fnv1a64(b"pm0025.trskl"))
    );
    assert!(files.iter().all(|f| f.file_index < 4));
}

#[test]
fn test_shared_context_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let archive = MonolithicArchive::open_with(write_archive(dir.path()), &context()).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let data = archive
                    .extract(AssetKey::Path("pokemon/pm0025/pm0025.trskl"))
                    .unwrap()
                    .unwrap();
                assert_eq!(data, b"pikachu skeleton");
            });
        }
    });
    assert_eq!(archive.context().hash_cache().len(), 1);
}
