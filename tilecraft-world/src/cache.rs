use std::sync::Arc;
use std::time::Instant;

use tilecraft_anvil::{BlockPos, Chunk, ChunkPos, ChunkStatus, LocalBlockPos, RegionFile, RegionPos};
use tilecraft_metrics::ScanMetrics;

use crate::world::{RegionSource, World};

/// Slot counts of the two direct-mapped arrays, as powers of two per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// 2 means a 4x4 array of region slots.
    pub region_bits: u32,
    /// 5 means a 32x32 array of chunk slots.
    pub chunk_bits: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            region_bits: 2,
            chunk_bits: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Misses whose region does not exist in the world.
    pub region_not_found: u64,
    /// Misses whose chunk does not exist in its region.
    pub not_found: u64,
    /// Misses that failed to read or decode.
    pub invalid: u64,
}

/// Everything known about one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub id: u16,
    pub data: u16,
    pub biome: u8,
    pub block_light: u8,
    pub sky_light: u8,
}

impl Default for Block {
    fn default() -> Self {
        Self {
            id: 0,
            data: 0,
            biome: 0,
            block_light: 0,
            sky_light: 15,
        }
    }
}

fn slot_index(x: i32, z: i32, bits: u32) -> usize {
    let mask = (1i32 << bits) - 1;
    (((x & mask) << bits) | (z & mask)) as usize
}

/// Direct-mapped cache of regions and decoded chunks.
///
/// Each position maps to exactly one slot; a miss overwrites whatever the
/// slot held. Failed loads leave the slot empty. Not meant to be shared
/// between threads: give every worker its own cache.
pub struct WorldCache<S: RegionSource = World> {
    source: S,
    config: CacheConfig,
    regions: Vec<Option<(RegionPos, RegionFile)>>,
    chunks: Vec<Option<(ChunkPos, Chunk)>>,
    region_stats: CacheStats,
    chunk_stats: CacheStats,
    metrics: Option<Arc<ScanMetrics>>,
}

impl<S: RegionSource> WorldCache<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, CacheConfig::default())
    }

    pub fn with_config(source: S, config: CacheConfig) -> Self {
        let region_slots = 1usize << (2 * config.region_bits);
        let chunk_slots = 1usize << (2 * config.chunk_bits);
        Self {
            source,
            config,
            regions: (0..region_slots).map(|_| None).collect(),
            chunks: (0..chunk_slots).map(|_| None).collect(),
            region_stats: CacheStats::default(),
            chunk_stats: CacheStats::default(),
            metrics: None,
        }
    }

    /// Also reports hits, misses and read times to `metrics`.
    pub fn set_metrics(&mut self, metrics: Arc<ScanMetrics>) {
        self.metrics = Some(metrics);
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    pub fn region_stats(&self) -> CacheStats {
        self.region_stats
    }

    pub fn chunk_stats(&self) -> CacheStats {
        self.chunk_stats
    }

    /// Empties every slot. Statistics are kept.
    pub fn clear(&mut self) {
        self.regions.iter_mut().for_each(|slot| *slot = None);
        self.chunks.iter_mut().for_each(|slot| *slot = None);
    }

    fn region_slot(&self, pos: RegionPos) -> usize {
        slot_index(pos.x, pos.z, self.config.region_bits)
    }

    fn chunk_slot(&self, pos: ChunkPos) -> usize {
        slot_index(pos.x, pos.z, self.config.chunk_bits)
    }

    /// A fully read region, or `None` if it is missing or corrupt.
    pub fn get_region(&mut self, pos: RegionPos) -> Option<&RegionFile> {
        let slot = self.region_slot(pos);
        let hit = matches!(&self.regions[slot], Some((key, _)) if *key == pos);
        if let Some(metrics) = &self.metrics {
            metrics.record_region_cache(hit);
        }
        if hit {
            self.region_stats.hits += 1;
            return self.regions[slot].as_ref().map(|(_, region)| region);
        }

        self.region_stats.misses += 1;
        self.regions[slot] = None;
        log::debug!("Region cache miss at {pos} (slot {slot})");

        let mut region = match self.source.open_region(pos) {
            Ok(Some(region)) => region,
            Ok(None) => {
                self.region_stats.region_not_found += 1;
                return None;
            }
            Err(err) => {
                log::error!("Unable to open region {pos}: {err:#}");
                self.region_stats.invalid += 1;
                return None;
            }
        };

        let start = Instant::now();
        if let Err(err) = region.read_all() {
            log::warn!("Skipping region {}: {err}", region.path().display());
            self.region_stats.invalid += 1;
            if let Some(metrics) = &self.metrics {
                metrics.record_region_skipped();
            }
            return None;
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_region_read(start.elapsed(), region.containing_chunks_count());
        }

        self.regions[slot] = Some((pos, region));
        self.regions[slot].as_ref().map(|(_, region)| region)
    }

    /// A decoded chunk, or `None` if it is missing or corrupt.
    pub fn get_chunk(&mut self, pos: ChunkPos) -> Option<&Chunk> {
        let slot = self.chunk_slot(pos);
        let hit = matches!(&self.chunks[slot], Some((key, _)) if *key == pos);
        if let Some(metrics) = &self.metrics {
            metrics.record_chunk_cache(hit);
        }
        if hit {
            self.chunk_stats.hits += 1;
            return self.chunks[slot].as_ref().map(|(_, chunk)| chunk);
        }

        self.chunk_stats.misses += 1;
        self.chunks[slot] = None;
        log::trace!("Chunk cache miss at {pos} (slot {slot})");

        let mut chunk = Chunk::default();
        let start = Instant::now();
        let status = match self.get_region(pos.region()) {
            Some(region) => region.load_chunk(pos, &mut chunk),
            None => {
                self.chunk_stats.region_not_found += 1;
                return None;
            }
        };

        if status != ChunkStatus::DoesNotExist {
            if let Some(metrics) = &self.metrics {
                metrics.record_chunk_decode(start.elapsed(), status == ChunkStatus::Ok);
            }
        }
        match status {
            ChunkStatus::Ok => {}
            ChunkStatus::DoesNotExist => {
                self.chunk_stats.not_found += 1;
                return None;
            }
            ChunkStatus::DataInvalid | ChunkStatus::NbtError => {
                log::warn!("Unable to load chunk {pos}: {status}");
                self.chunk_stats.invalid += 1;
                return None;
            }
        }

        self.chunks[slot] = Some((pos, chunk));
        self.chunks[slot].as_ref().map(|(_, chunk)| chunk)
    }

    /// The block at a global position. Missing chunks and `y < 0` read as
    /// air under open sky.
    pub fn get_block(&mut self, pos: BlockPos) -> Block {
        if pos.y < 0 {
            return Block::default();
        }
        let Some(chunk) = self.get_chunk(ChunkPos::from(pos)) else {
            return Block::default();
        };
        let local = LocalBlockPos::from(pos);
        Block {
            id: chunk.block_id(local),
            data: chunk.block_data(local) as u16,
            biome: chunk.biome_at(local),
            block_light: chunk.block_light(local),
            sky_light: chunk.sky_light(local),
        }
    }
}
