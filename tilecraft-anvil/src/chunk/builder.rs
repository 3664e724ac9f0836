use std::collections::{BTreeSet, HashMap};

use tilecraft_nbt::{Compound, Compression, List, NbtFile};

use super::{BIOME_COUNT, CHUNK_HEIGHT, SECTION_BLOCKS, SECTION_NIBBLES};

/// Builds the tag tree of a legacy-format chunk.
///
/// Sections are only emitted for heights that received a block, a layer or
/// a light value.
pub struct ChunkBuilder {
    chunk_x: i32,
    chunk_z: i32,
    // Key: (x, z, y), Value: (id, data)
    custom_blocks: HashMap<(u8, u8, i32), (u16, u8)>,
    // Key: y, Value: (id, data)
    full_layers: HashMap<i32, (u16, u8)>,
    // Key: (x, z, y), Value: (block light, sky light)
    light: HashMap<(u8, u8, i32), (u8, u8)>,
    biomes: [u8; BIOME_COUNT],
    terrain_populated: bool,
    last_update: i64,
}

fn in_height(y: i32) -> bool {
    (0..(CHUNK_HEIGHT as i32) * 16).contains(&y)
}

fn set_nibble(array: &mut [u8], offset: usize, value: u8) {
    let byte = &mut array[offset / 2];
    if offset % 2 == 0 {
        *byte = (*byte & 0xf0) | (value & 0x0f);
    } else {
        *byte = (*byte & 0x0f) | ((value & 0x0f) << 4);
    }
}

impl ChunkBuilder {
    pub fn new(chunk_x: i32, chunk_z: i32) -> Self {
        Self {
            chunk_x,
            chunk_z,
            custom_blocks: HashMap::new(),
            full_layers: HashMap::new(),
            light: HashMap::new(),
            biomes: [0; BIOME_COUNT],
            terrain_populated: true,
            last_update: 0,
        }
    }

    /// Set a single block at chunk-local coordinates (x, z: 0..15).
    pub fn set_block(&mut self, x: u8, z: u8, y: i32, id: u16, data: u8) {
        if x < 16 && z < 16 && in_height(y) {
            self.custom_blocks.insert((x, z, y), (id, data & 0x0f));
        }
    }

    /// Fill an entire Y-layer with a block.
    pub fn fill_layer(&mut self, y: i32, id: u16, data: u8) {
        if in_height(y) {
            self.full_layers.insert(y, (id, data & 0x0f));
            // Single blocks on this layer are overwritten.
            self.custom_blocks.retain(|(_, _, by), _| *by != y);
        }
    }

    pub fn set_light(&mut self, x: u8, z: u8, y: i32, block_light: u8, sky_light: u8) {
        if x < 16 && z < 16 && in_height(y) {
            self.light.insert((x, z, y), (block_light & 0x0f, sky_light & 0x0f));
        }
    }

    pub fn set_biome(&mut self, x: u8, z: u8, biome: u8) {
        if x < 16 && z < 16 {
            self.biomes[z as usize * 16 + x as usize] = biome;
        }
    }

    pub fn set_terrain_populated(&mut self, populated: bool) {
        self.terrain_populated = populated;
    }

    pub fn set_last_update(&mut self, last_update: i64) {
        self.last_update = last_update;
    }

    fn section_heights(&self) -> BTreeSet<i32> {
        self.custom_blocks
            .keys()
            .map(|(_, _, y)| *y)
            .chain(self.full_layers.keys().copied())
            .chain(self.light.keys().map(|(_, _, y)| *y))
            .map(|y| y / 16)
            .collect()
    }

    fn build_section(&self, section_y: i32) -> Compound {
        let mut blocks = vec![0u8; SECTION_BLOCKS];
        let mut add = vec![0u8; SECTION_NIBBLES];
        let mut data = vec![0u8; SECTION_NIBBLES];
        let mut block_light = vec![0u8; SECTION_NIBBLES];
        // Open sky unless told otherwise.
        let mut sky_light = vec![0xffu8; SECTION_NIBBLES];
        let mut has_add = false;

        // Index = (y * 16 + z) * 16 + x
        for ly in 0..16 {
            let world_y = section_y * 16 + ly;
            for z in 0..16u8 {
                for x in 0..16u8 {
                    let offset = ((ly as usize * 16) + z as usize) * 16 + x as usize;
                    let block = self
                        .custom_blocks
                        .get(&(x, z, world_y))
                        .or_else(|| self.full_layers.get(&world_y));
                    if let Some(&(id, block_data)) = block {
                        blocks[offset] = (id & 0xff) as u8;
                        let high = ((id >> 8) & 0x0f) as u8;
                        has_add |= high != 0;
                        set_nibble(&mut add, offset, high);
                        set_nibble(&mut data, offset, block_data);
                    }
                    if let Some(&(bl, sl)) = self.light.get(&(x, z, world_y)) {
                        set_nibble(&mut block_light, offset, bl);
                        set_nibble(&mut sky_light, offset, sl);
                    }
                }
            }
        }

        let mut section = Compound::new()
            .with("Y", section_y as i8)
            .with("Blocks", blocks)
            .with("Data", data)
            .with("BlockLight", block_light)
            .with("SkyLight", sky_light);
        if has_add {
            section.insert("Add", add);
        }
        section
    }

    /// Build the root tag tree (`{"": {Level: {...}}}`).
    pub fn build(&self) -> NbtFile {
        let sections = self
            .section_heights()
            .into_iter()
            .map(|y| self.build_section(y))
            .collect();

        let level = Compound::new()
            .with("xPos", self.chunk_x)
            .with("zPos", self.chunk_z)
            .with("LastUpdate", self.last_update)
            .with("TerrainPopulated", self.terrain_populated as i8)
            .with("Biomes", self.biomes.to_vec())
            .with("Sections", List::Compound(sections));
        NbtFile::new("", Compound::new().with("Level", level))
    }

    pub fn to_bytes(&self, compression: Compression) -> tilecraft_nbt::Result<Vec<u8>> {
        self.build().to_bytes(compression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_touched_sections_are_built() {
        let mut builder = ChunkBuilder::new(0, 0);
        builder.set_block(0, 0, 5, 1, 0);
        builder.fill_layer(40, 2, 0);
        let file = builder.build();
        let level = file.get_compound("Level").unwrap();
        let sections = level.get_list("Sections").and_then(List::as_compounds).unwrap();
        let heights: Vec<_> = sections.iter().filter_map(|s| s.get_byte("Y")).collect();
        assert_eq!(heights, vec![0, 2]);
        assert!(!sections[0].contains_key("Add"));
    }

    #[test]
    fn test_layer_overrides_blocks() {
        let mut builder = ChunkBuilder::new(0, 0);
        builder.set_block(3, 3, 7, 5, 0);
        builder.fill_layer(7, 9, 1);
        assert!(builder.custom_blocks.is_empty());
        let file = builder.build();
        let level = file.get_compound("Level").unwrap();
        let sections = level.get_list("Sections").and_then(List::as_compounds).unwrap();
        let blocks = sections[0].get_byte_array("Blocks").unwrap();
        assert_eq!(blocks[(7 * 16 + 3) * 16 + 3], 9);
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut builder = ChunkBuilder::new(0, 0);
        builder.set_block(16, 0, 0, 1, 0);
        builder.set_block(0, 0, 256, 1, 0);
        builder.set_block(0, 0, -1, 1, 0);
        assert!(builder.section_heights().is_empty());
    }

    #[test]
    fn test_nibble_packing() {
        let mut array = vec![0u8; 2];
        set_nibble(&mut array, 0, 0xa);
        set_nibble(&mut array, 1, 0xb);
        set_nibble(&mut array, 3, 0x1);
        assert_eq!(array, vec![0xba, 0x10]);
    }
}
