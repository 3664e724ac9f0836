use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tempfile::TempDir;
use tilecraft_anvil::{BlockPos, ChunkBuilder, ChunkPos, RegionFile, RegionPos};
use tilecraft_metrics::ScanMetrics;
use tilecraft_nbt::Compression;
use tilecraft_world::{
    Block, CacheConfig, RegionSource, World, WorldCache, WorldOptions,
};

/// Opens region files from a fixed map and counts every open.
struct CountingSource {
    paths: HashMap<RegionPos, PathBuf>,
    opened: Cell<usize>,
}

impl CountingSource {
    fn new(paths: HashMap<RegionPos, PathBuf>) -> Self {
        Self {
            paths,
            opened: Cell::new(0),
        }
    }
}

impl RegionSource for CountingSource {
    fn open_region(&self, pos: RegionPos) -> anyhow::Result<Option<RegionFile>> {
        self.opened.set(self.opened.get() + 1);
        match self.paths.get(&pos) {
            Some(path) => Ok(Some(RegionFile::new(path)?)),
            None => Ok(None),
        }
    }
}

fn write_chunk(region: &mut RegionFile, pos: ChunkPos, block: u16) {
    let mut builder = ChunkBuilder::new(pos.x, pos.z);
    builder.set_block(1, 2, 3, block, 4);
    builder.set_biome(1, 2, 7);
    let bytes = builder.to_bytes(Compression::Zlib).unwrap();
    region.set_chunk_data(pos, bytes, Compression::Zlib);
}

fn write_region(dir: &Path, pos: RegionPos, chunks: &[(ChunkPos, u16)]) -> PathBuf {
    let path = dir.join(pos.filename());
    let mut region = RegionFile::new(&path).unwrap();
    for &(chunk, block) in chunks {
        write_chunk(&mut region, chunk, block);
    }
    region.save().unwrap();
    path
}

#[test]
fn test_repeated_get_hits_without_io() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_region(dir.path(), RegionPos::new(0, 0), &[(ChunkPos::new(2, 3), 9)]);
    let source = CountingSource::new([(RegionPos::new(0, 0), path)].into());
    let mut cache = WorldCache::new(source);

    let first = cache.get_chunk(ChunkPos::new(2, 3)).cloned().unwrap();
    assert_eq!(cache.source().opened.get(), 1);

    let second = cache.get_chunk(ChunkPos::new(2, 3)).unwrap();
    assert_eq!(second.pos(), first.pos());
    assert_eq!(second.biomes(), first.biomes());
    assert_eq!(cache.source().opened.get(), 1);
    assert_eq!(cache.chunk_stats().hits, 1);
    assert_eq!(cache.chunk_stats().misses, 1);

    assert!(cache.get_region(RegionPos::new(0, 0)).is_some());
    assert_eq!(cache.source().opened.get(), 1);
    assert_eq!(cache.region_stats().hits, 1);
}

#[test]
fn test_slot_collision_evicts_first_key() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let west = write_region(dir.path(), RegionPos::new(0, 0), &[(ChunkPos::new(0, 0), 1)]);
    let east = write_region(dir.path(), RegionPos::new(1, 0), &[(ChunkPos::new(32, 0), 2)]);
    let source = CountingSource::new(
        [(RegionPos::new(0, 0), west), (RegionPos::new(1, 0), east)].into(),
    );
    let mut cache = WorldCache::new(source);

    // Chunks 0:0 and 32:0 share slot 0 of the 32x32 chunk array.
    assert_eq!(cache.get_block(BlockPos::new(1, 2, 3)).id, 1);
    assert_eq!(cache.get_block(BlockPos::new(513, 2, 3)).id, 2);
    assert_eq!(cache.chunk_stats().misses, 2);

    assert_eq!(cache.get_block(BlockPos::new(1, 2, 3)).id, 1);
    let stats = cache.chunk_stats();
    assert_eq!(stats.misses, 3);
    assert_eq!(stats.hits, 0);

    // Both regions still sit in distinct region slots.
    assert_eq!(cache.source().opened.get(), 2);
    assert_eq!(cache.region_stats().hits, 1);
}

#[test]
fn test_region_slot_collision() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let a = write_region(dir.path(), RegionPos::new(0, 0), &[(ChunkPos::new(0, 0), 1)]);
    let b = write_region(dir.path(), RegionPos::new(2, 0), &[(ChunkPos::new(64, 0), 1)]);
    let source = CountingSource::new([(RegionPos::new(0, 0), a), (RegionPos::new(2, 0), b)].into());
    let config = CacheConfig {
        region_bits: 1,
        chunk_bits: 5,
    };
    let mut cache = WorldCache::with_config(source, config);

    assert!(cache.get_region(RegionPos::new(0, 0)).is_some());
    assert!(cache.get_region(RegionPos::new(2, 0)).is_some());
    assert!(cache.get_region(RegionPos::new(0, 0)).is_some());
    assert_eq!(cache.source().opened.get(), 3);
    assert_eq!(cache.region_stats().misses, 3);
}

#[test]
fn test_failures_are_not_cached() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let corrupt = dir.path().join("r.0.0.mca");
    std::fs::write(&corrupt, vec![0u8; 100]).unwrap();
    let source = CountingSource::new([(RegionPos::new(0, 0), corrupt)].into());
    let mut cache = WorldCache::new(source);

    assert!(cache.get_region(RegionPos::new(0, 0)).is_none());
    assert!(cache.get_region(RegionPos::new(0, 0)).is_none());
    assert_eq!(cache.source().opened.get(), 2);
    assert_eq!(cache.region_stats().invalid, 2);

    assert!(cache.get_region(RegionPos::new(5, 5)).is_none());
    assert_eq!(cache.region_stats().region_not_found, 1);
}

#[test]
fn test_missing_chunk_and_negative_height() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_region(dir.path(), RegionPos::new(0, 0), &[(ChunkPos::new(0, 0), 5)]);
    let source = CountingSource::new([(RegionPos::new(0, 0), path)].into());
    let mut cache = WorldCache::new(source);

    assert_eq!(cache.get_block(BlockPos::new(20, 0, 3)), Block::default());
    assert_eq!(cache.chunk_stats().not_found, 1);
    assert_eq!(cache.get_block(BlockPos::new(1, 2, -1)), Block::default());

    let block = cache.get_block(BlockPos::new(1, 2, 3));
    assert_eq!(block.id, 5);
    assert_eq!(block.data, 4);
    assert_eq!(block.biome, 7);
}

#[test]
fn test_world_backed_cache_with_metrics() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let region_dir = dir.path().join("region");
    std::fs::create_dir_all(&region_dir).unwrap();
    write_region(&region_dir, RegionPos::new(-1, 0), &[(ChunkPos::new(-1, 0), 12)]);

    let mut world = World::new(dir.path(), WorldOptions::default());
    world.load().unwrap();
    let metrics = Arc::new(ScanMetrics::new("test".to_string()));
    let mut cache = WorldCache::new(world);
    cache.set_metrics(Arc::clone(&metrics));

    let block = cache.get_block(BlockPos::new(-15, 2, 3));
    assert_eq!(block.id, 12);
    cache.get_block(BlockPos::new(-15, 2, 4));

    assert_eq!(metrics.regions_scanned.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.chunks_decoded.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.chunk_cache_hits.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.chunk_cache_misses.load(Ordering::Relaxed), 1);
}
