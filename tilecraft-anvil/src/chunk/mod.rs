//! Decoded chunks in the legacy section format (`Blocks`/`Add`/`Data`
//! byte arrays with nibble-packed light).

mod builder;
mod light;

pub use builder::ChunkBuilder;
pub use light::LightingData;

use std::fmt;
use std::sync::Arc;

use tilecraft_nbt::{Compound, Compression, NbtFile};

use crate::crop::{BlockState, Crop, NoCrop};
use crate::pos::{ChunkPos, LocalBlockPos};

/// Sections per chunk column.
pub const CHUNK_HEIGHT: usize = 16;
pub const SECTION_BLOCKS: usize = 4096;
pub const SECTION_NIBBLES: usize = 2048;
pub const BIOME_COUNT: usize = 256;

/// Sky light reported where no section is stored.
pub const DEFAULT_SKY_LIGHT: u8 = 15;

/// One 16x16x16 slice of a chunk. Arrays are indexed `(y * 16 + z) * 16 + x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSection {
    pub y: u8,
    pub blocks: Vec<u8>,
    pub add: Vec<u8>,
    pub data: Vec<u8>,
    pub block_light: Vec<u8>,
    pub sky_light: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
enum NibbleArray {
    Data,
    BlockLight,
    SkyLight,
}

impl NibbleArray {
    fn default_value(self) -> u8 {
        match self {
            NibbleArray::SkyLight => DEFAULT_SKY_LIGHT,
            _ => 0,
        }
    }
}

impl ChunkSection {
    fn from_tag(tag: &Compound) -> Option<Self> {
        let y = tag.get_byte("Y")?;
        if !(0..CHUNK_HEIGHT as i8).contains(&y) {
            return None;
        }
        let array = |name: &str, len: usize| {
            tag.get_byte_array(name)
                .filter(|bytes| bytes.len() == len)
                .map(<[u8]>::to_vec)
        };
        let add = array("Add", SECTION_NIBBLES).unwrap_or_else(|| vec![0; SECTION_NIBBLES]);
        Some(Self {
            y: y as u8,
            blocks: array("Blocks", SECTION_BLOCKS)?,
            add,
            data: array("Data", SECTION_NIBBLES)?,
            block_light: array("BlockLight", SECTION_NIBBLES)?,
            sky_light: array("SkyLight", SECTION_NIBBLES)?,
        })
    }

    fn nibbles(&self, array: NibbleArray) -> &[u8] {
        match array {
            NibbleArray::Data => &self.data,
            NibbleArray::BlockLight => &self.block_light,
            NibbleArray::SkyLight => &self.sky_light,
        }
    }
}

/// Even offsets live in the low nibble.
fn nibble(array: &[u8], offset: usize) -> u8 {
    let byte = array[offset / 2];
    if offset % 2 == 0 { byte & 0x0f } else { (byte >> 4) & 0x0f }
}

/// A chunk column decoded from one region file slot.
///
/// Rotation and crop are set before decoding; queries take rotated local
/// coordinates and answer from the unrotated stored arrays.
#[derive(Clone)]
pub struct Chunk {
    pos: ChunkPos,
    pos_original: ChunkPos,
    rotation: u8,
    crop: Arc<dyn Crop>,
    completely_contained: bool,
    terrain_populated: bool,
    biomes: [u8; BIOME_COUNT],
    section_offsets: [Option<usize>; CHUNK_HEIGHT],
    sections: Vec<ChunkSection>,
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new(0, Arc::new(NoCrop))
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("pos", &self.pos)
            .field("pos_original", &self.pos_original)
            .field("rotation", &self.rotation)
            .field("terrain_populated", &self.terrain_populated)
            .field("sections", &self.sections.len())
            .finish()
    }
}

impl Chunk {
    pub fn new(rotation: u8, crop: Arc<dyn Crop>) -> Self {
        Self {
            pos: ChunkPos::default(),
            pos_original: ChunkPos::default(),
            rotation: rotation % 4,
            crop,
            completely_contained: true,
            terrain_populated: false,
            biomes: [0; BIOME_COUNT],
            section_offsets: [None; CHUNK_HEIGHT],
            sections: Vec::new(),
        }
    }

    pub fn set_rotation(&mut self, rotation: u8) {
        self.rotation = rotation % 4;
    }

    pub fn set_crop(&mut self, crop: Arc<dyn Crop>) {
        self.crop = crop;
    }

    fn clear(&mut self) {
        self.sections.clear();
        self.section_offsets = [None; CHUNK_HEIGHT];
        self.biomes = [0; BIOME_COUNT];
        self.terrain_populated = false;
        self.completely_contained = true;
    }

    /// Decodes a compressed chunk payload with the given rotation and crop.
    /// Logs and returns `false` on any failure.
    pub fn decode(
        &mut self,
        data: &[u8],
        compression: Compression,
        rotation: u8,
        crop: Arc<dyn Crop>,
    ) -> bool {
        self.set_rotation(rotation);
        self.set_crop(crop);
        match self.read_nbt(data, compression) {
            Ok(valid) => valid,
            Err(err) => {
                log::error!("Unable to decode chunk: {err}");
                false
            }
        }
    }

    /// Decodes a payload with the current rotation and crop.
    ///
    /// Stream errors are returned as `Err`; a readable tree that lacks the
    /// level compound or its position yields `Ok(false)`.
    pub fn read_nbt(
        &mut self,
        data: &[u8],
        compression: Compression,
    ) -> tilecraft_nbt::Result<bool> {
        self.clear();
        let file = NbtFile::from_bytes(data, compression)?;
        Ok(self.read_level(&file))
    }

    fn read_level(&mut self, file: &NbtFile) -> bool {
        let Some(level) = file.get_compound("Level") else {
            log::error!("Corrupt chunk: no level tag found");
            return false;
        };
        let (Some(x), Some(z)) = (level.get_int("xPos"), level.get_int("zPos")) else {
            log::error!("Corrupt chunk: no x/z position found");
            return false;
        };

        self.pos_original = ChunkPos::new(x, z);
        self.pos = self.pos_original.rotate(self.rotation);
        self.completely_contained = self.crop.is_chunk_completely_contained(self.pos_original);

        match level.get_byte("TerrainPopulated") {
            Some(flag) => self.terrain_populated = flag != 0,
            None => log::warn!("Corrupt chunk {}: no terrain populated tag found", self.pos),
        }

        if level.has_byte_array("Biomes", Some(BIOME_COUNT)) {
            if let Some(biomes) = level.get_byte_array("Biomes") {
                self.biomes.copy_from_slice(biomes);
            }
        } else if let Some(biomes) = level
            .get_int_array("Biomes")
            .filter(|b| b.len() == BIOME_COUNT)
        {
            for (dst, src) in self.biomes.iter_mut().zip(biomes) {
                *dst = *src as u8;
            }
        } else {
            log::warn!("Corrupt chunk {}: no biome data found", self.pos);
        }

        // Empty chunks of the end sometimes carry no section list at all.
        let Some(sections) = level.get_list("Sections") else {
            return true;
        };
        let Some(sections) = sections.as_compounds() else {
            return true;
        };

        for tag in sections {
            let Some(section) = ChunkSection::from_tag(tag) else {
                log::debug!("Skipping invalid section in chunk {}", self.pos);
                continue;
            };
            self.section_offsets[section.y as usize] = Some(self.sections.len());
            self.sections.push(section);
        }
        true
    }

    /// Position after rotation.
    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn original_pos(&self) -> ChunkPos {
        self.pos_original
    }

    pub fn rotation(&self) -> u8 {
        self.rotation
    }

    pub fn is_terrain_populated(&self) -> bool {
        self.terrain_populated
    }

    pub fn has_section(&self, section: i32) -> bool {
        self.section(section).is_some()
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Highest stored section index, if any.
    pub fn highest_section(&self) -> Option<usize> {
        self.section_offsets.iter().rposition(Option::is_some)
    }

    fn section(&self, section: i32) -> Option<&ChunkSection> {
        let index = usize::try_from(section).ok()?;
        let offset = (*self.section_offsets.get(index)?)?;
        self.sections.get(offset)
    }

    // Whether a block (unrotated local x/z) passes the crop.
    fn check_crop(&self, x: i32, z: i32, y: i32) -> bool {
        if !self.terrain_populated && self.crop.crop_unpopulated_chunks() {
            return false;
        }
        let global = LocalBlockPos::new(x, z, y).to_global(self.pos_original);
        if !self.crop.is_block_contained_y(global) {
            return false;
        }
        self.completely_contained || self.crop.is_block_contained_xz(global)
    }

    // Section and array offset of a visible block.
    fn locate(&self, pos: LocalBlockPos) -> Option<(&ChunkSection, usize)> {
        if pos.y < 0 {
            return None;
        }
        let section = self.section(pos.y / 16)?;
        let local = pos.unrotate(self.rotation);
        if !self.check_crop(local.x, local.z, pos.y) {
            return None;
        }
        let offset = (((pos.y % 16) * 16 + local.z) * 16 + local.x) as usize;
        Some((section, offset))
    }

    fn raw_block_id(&self, pos: LocalBlockPos) -> u16 {
        match self.locate(pos) {
            Some((section, offset)) => {
                let add = nibble(&section.add, offset) as u16;
                section.blocks[offset] as u16 + (add << 8)
            }
            None => 0,
        }
    }

    fn raw_nibble(&self, pos: LocalBlockPos, array: NibbleArray) -> u8 {
        match self.locate(pos) {
            Some((section, offset)) => nibble(section.nibbles(array), offset),
            None => array.default_value(),
        }
    }

    fn nibble_value(&self, pos: LocalBlockPos, array: NibbleArray) -> u8 {
        let value = self.raw_nibble(pos, array);
        if let Some(mask) = self.crop.block_mask() {
            let data = match array {
                NibbleArray::Data => value,
                _ => self.raw_nibble(pos, NibbleArray::Data),
            };
            if mask.is_hidden(self.raw_block_id(pos), data) {
                return array.default_value();
            }
        }
        value
    }

    /// 12-bit block id, or 0 where no block is visible.
    pub fn block_id(&self, pos: LocalBlockPos) -> u16 {
        let id = self.raw_block_id(pos);
        let Some(mask) = self.crop.block_mask() else {
            return id;
        };
        match mask.state(id) {
            BlockState::CompletelyHidden => 0,
            BlockState::CompletelyShown => id,
            BlockState::PartiallyHidden => {
                if mask.is_hidden(id, self.raw_nibble(pos, NibbleArray::Data)) {
                    0
                } else {
                    id
                }
            }
        }
    }

    pub fn block_data(&self, pos: LocalBlockPos) -> u8 {
        self.nibble_value(pos, NibbleArray::Data)
    }

    pub fn block_light(&self, pos: LocalBlockPos) -> u8 {
        self.nibble_value(pos, NibbleArray::BlockLight)
    }

    /// 15 where no section is stored.
    pub fn sky_light(&self, pos: LocalBlockPos) -> u8 {
        self.nibble_value(pos, NibbleArray::SkyLight)
    }

    pub fn light(&self, pos: LocalBlockPos) -> LightingData {
        LightingData::new(self.block_light(pos), self.sky_light(pos))
    }

    /// Biome id of the column at `pos` (y is ignored).
    pub fn biome_at(&self, pos: LocalBlockPos) -> u8 {
        let local = pos.unrotate(self.rotation);
        self.biomes[(local.z * 16 + local.x) as usize]
    }

    pub fn biomes(&self) -> &[u8; BIOME_COUNT] {
        &self.biomes
    }
}
