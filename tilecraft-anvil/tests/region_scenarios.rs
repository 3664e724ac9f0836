use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use fastnbt::ByteArray;
use serde::Serialize;
use tempfile::TempDir;
use tilecraft_anvil::{
    Chunk, ChunkBuilder, ChunkPos, ChunkStatus, Crop, LocalBlockPos, RegionFile, WorldCrop,
};
use tilecraft_nbt::Compression;

fn chunk_bytes(x: i32, z: i32, block: u16) -> Vec<u8> {
    let mut builder = ChunkBuilder::new(x, z);
    builder.set_block(0, 0, 0, block, 0);
    builder.to_bytes(Compression::Zlib).unwrap()
}

fn write_region(path: &Path, chunks: &[(ChunkPos, u32)]) {
    let mut region = RegionFile::new(path).unwrap();
    for &(pos, timestamp) in chunks {
        region.set_chunk_data(pos, chunk_bytes(pos.x, pos.z, 1), Compression::Zlib);
        region.set_chunk_timestamp(pos, timestamp);
    }
    region.save().unwrap();
}

#[test]
fn test_single_chunk_world_queries() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("r.0.0.mca");

    let mut builder = ChunkBuilder::new(0, 0);
    // Section y=2 covers heights 32..48.
    builder.set_block(3, 4, 34, 35, 14);
    builder.set_block(0, 0, 47, 89, 0);
    builder.set_biome(3, 4, 5);
    let mut region = RegionFile::new(&path).unwrap();
    region.set_chunk_data(
        ChunkPos::new(0, 0),
        builder.to_bytes(Compression::Zlib).unwrap(),
        Compression::Zlib,
    );
    region.save().unwrap();

    let mut region = RegionFile::new(&path).unwrap();
    region.read_all().unwrap();
    let mut chunk = Chunk::default();
    assert_eq!(region.load_chunk(ChunkPos::new(0, 0), &mut chunk), ChunkStatus::Ok);

    assert!(chunk.has_section(2));
    assert!(!chunk.has_section(10));
    assert_eq!(chunk.block_id(LocalBlockPos::new(3, 4, 34)), 35);
    assert_eq!(chunk.block_data(LocalBlockPos::new(3, 4, 34)), 14);
    assert_eq!(chunk.block_id(LocalBlockPos::new(0, 0, 47)), 89);
    assert_eq!(chunk.biome_at(LocalBlockPos::new(3, 4, 0)), 5);

    let absent = LocalBlockPos::new(3, 4, 10 * 16 + 3);
    assert_eq!(chunk.block_id(absent), 0);
    assert_eq!(chunk.block_data(absent), 0);
    assert_eq!(chunk.sky_light(absent), 15);
    assert_eq!(chunk.block_light(absent), 0);
}

#[test]
fn test_headers_list_present_chunks() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("r.0.0.mca");
    write_region(&path, &[(ChunkPos::new(0, 0), 100), (ChunkPos::new(5, 5), 200)]);

    let mut region = RegionFile::new(&path).unwrap();
    region.read_headers().unwrap();
    let expected: BTreeSet<_> = [ChunkPos::new(0, 0), ChunkPos::new(5, 5)].into();
    assert_eq!(region.containing_chunks(), &expected);
    assert_eq!(region.chunk_timestamp(ChunkPos::new(5, 5)), 200);

    region.read_all().unwrap();
    let mut chunk = Chunk::default();
    assert_eq!(
        region.load_chunk(ChunkPos::new(1, 1), &mut chunk),
        ChunkStatus::DoesNotExist
    );
    assert_eq!(region.load_chunk(ChunkPos::new(5, 5), &mut chunk), ChunkStatus::Ok);
    assert_eq!(chunk.pos(), ChunkPos::new(5, 5));
}

#[test]
fn test_headers_only_has_no_payloads() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("r.0.0.mca");
    write_region(&path, &[(ChunkPos::new(0, 0), 1)]);

    let mut region = RegionFile::new(&path).unwrap();
    region.read_headers().unwrap();
    assert!(region.has_chunk(ChunkPos::new(0, 0)));
    assert!(region.chunk_data(ChunkPos::new(0, 0)).is_empty());
}

#[test]
fn test_rewrite_preserves_content() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let original = dir.path().join("r.-1.2.mca");
    let chunks = [
        (ChunkPos::new(-32, 64), 10),
        (ChunkPos::new(-1, 95), 20),
        (ChunkPos::new(-20, 70), 30),
    ];
    write_region(&original, &chunks);

    let mut first = RegionFile::new(&original).unwrap();
    first.read_all().unwrap();
    let copy = dir.path().join("copy").join("r.-1.2.mca");
    std::fs::create_dir_all(copy.parent().unwrap()).unwrap();
    first.write(&copy).unwrap();

    let mut second = RegionFile::new(&copy).unwrap();
    second.read_all().unwrap();
    assert_eq!(first.containing_chunks(), second.containing_chunks());
    for (pos, timestamp) in chunks {
        assert_eq!(second.chunk_timestamp(pos), timestamp);
        assert_eq!(second.chunk_data(pos), first.chunk_data(pos));
        assert_eq!(second.chunk_compression(pos), 2);
    }
    assert_eq!(std::fs::read(&original).unwrap(), std::fs::read(&copy).unwrap());
}

#[test]
fn test_removed_chunk_is_dropped_on_write() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("r.0.0.mca");
    write_region(&path, &[(ChunkPos::new(0, 0), 1), (ChunkPos::new(1, 0), 2)]);

    let mut region = RegionFile::new(&path).unwrap();
    region.read_all().unwrap();
    region.set_chunk_data(ChunkPos::new(0, 0), Vec::new(), Compression::Zlib);
    region.save().unwrap();

    let mut reread = RegionFile::new(&path).unwrap();
    reread.read_all().unwrap();
    assert_eq!(reread.containing_chunks_count(), 1);
    assert!(reread.has_chunk(ChunkPos::new(1, 0)));
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 8192 + 4096);
}

#[test]
fn test_cropped_chunks_are_hidden() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("r.0.0.mca");
    write_region(&path, &[(ChunkPos::new(0, 0), 1), (ChunkPos::new(10, 0), 2)]);

    let mut crop = WorldCrop::new();
    crop.set_max_x(100);
    let crop: Arc<dyn Crop> = Arc::new(crop);

    let mut region = RegionFile::new(&path).unwrap();
    region.set_crop(crop);
    region.read_all().unwrap();
    assert_eq!(region.containing_chunks_count(), 1);
    assert!(!region.has_chunk(ChunkPos::new(10, 0)));

    let mut chunk = Chunk::default();
    assert_eq!(
        region.load_chunk(ChunkPos::new(10, 0), &mut chunk),
        ChunkStatus::DoesNotExist
    );
    assert_eq!(region.load_chunk(ChunkPos::new(0, 0), &mut chunk), ChunkStatus::Ok);
}

#[test]
fn test_rotated_region_addresses_original_slots() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("r.0.0.mca");
    write_region(&path, &[(ChunkPos::new(3, 7), 1)]);

    let mut region = RegionFile::new(&path).unwrap();
    region.set_rotation(1);
    region.read_all().unwrap();

    let rotated = ChunkPos::new(3, 7).rotate(1);
    assert_eq!(region.containing_chunks().iter().next(), Some(&rotated));
    let mut chunk = Chunk::default();
    assert_eq!(region.load_chunk(rotated, &mut chunk), ChunkStatus::Ok);
    assert_eq!(chunk.original_pos(), ChunkPos::new(3, 7));
    assert_eq!(chunk.pos(), rotated);
    assert_eq!(chunk.rotation(), 1);
}

#[test]
fn test_corrupt_payloads() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("r.0.0.mca");
    let mut region = RegionFile::new(&path).unwrap();
    region.set_chunk_data(ChunkPos::new(0, 0), vec![1, 2, 3], Compression::Zlib);
    region.set_chunk_data(ChunkPos::new(1, 0), vec![1, 2, 3], Compression::None);
    let no_level = tilecraft_nbt::NbtFile::default().to_bytes(Compression::Gzip).unwrap();
    region.set_chunk_data(ChunkPos::new(2, 0), no_level, Compression::Gzip);

    let mut chunk = Chunk::default();
    assert_eq!(region.load_chunk(ChunkPos::new(0, 0), &mut chunk), ChunkStatus::NbtError);
    assert_eq!(region.load_chunk(ChunkPos::new(1, 0), &mut chunk), ChunkStatus::NbtError);
    assert_eq!(region.load_chunk(ChunkPos::new(2, 0), &mut chunk), ChunkStatus::DataInvalid);
}

#[derive(Serialize)]
struct LegacySection {
    #[serde(rename = "Y")]
    y: i8,
    #[serde(rename = "Blocks")]
    blocks: ByteArray,
    #[serde(rename = "Data")]
    data: ByteArray,
    #[serde(rename = "BlockLight")]
    block_light: ByteArray,
    #[serde(rename = "SkyLight")]
    sky_light: ByteArray,
}

#[derive(Serialize)]
struct LegacyLevel {
    #[serde(rename = "xPos")]
    x_pos: i32,
    #[serde(rename = "zPos")]
    z_pos: i32,
    #[serde(rename = "TerrainPopulated")]
    terrain_populated: i8,
    #[serde(rename = "Biomes")]
    biomes: ByteArray,
    #[serde(rename = "Sections")]
    sections: Vec<LegacySection>,
}

#[derive(Serialize)]
struct LegacyChunk {
    #[serde(rename = "Level")]
    level: LegacyLevel,
}

#[test]
fn test_chunk_serialized_by_fastnbt() {
    let mut blocks = vec![0i8; 4096];
    blocks[(5 * 16 + 2) * 16 + 1] = 4;
    let chunk = LegacyChunk {
        level: LegacyLevel {
            x_pos: 7,
            z_pos: -3,
            terrain_populated: 1,
            biomes: ByteArray::new(vec![2; 256]),
            sections: vec![LegacySection {
                y: 1,
                blocks: ByteArray::new(blocks),
                data: ByteArray::new(vec![0; 2048]),
                block_light: ByteArray::new(vec![0; 2048]),
                sky_light: ByteArray::new(vec![-1; 2048]),
            }],
        },
    };
    let raw = fastnbt::to_bytes(&chunk).unwrap();
    let payload = tilecraft_nbt::compress(&raw, Compression::Zlib).unwrap();

    let mut decoded = Chunk::default();
    assert!(decoded.decode(&payload, Compression::Zlib, 0, Arc::new(WorldCrop::new())));
    assert_eq!(decoded.pos(), ChunkPos::new(7, -3));
    assert!(decoded.is_terrain_populated());
    assert_eq!(decoded.block_id(LocalBlockPos::new(1, 2, 16 + 5)), 4);
    assert_eq!(decoded.sky_light(LocalBlockPos::new(1, 2, 16 + 5)), 15);
    assert_eq!(decoded.biome_at(LocalBlockPos::new(9, 9, 0)), 2);
}
