//! Visibility predicates restricting which parts of a world are rendered.
//!
//! All checks take positions in the original, unrotated world.

use bitvec::prelude::BitVec;

use crate::pos::{BlockPos, ChunkPos, RegionPos};

/// What a chunk or world consults before exposing a region, chunk or block.
pub trait Crop: Send + Sync {
    fn is_region_contained(&self, region: RegionPos) -> bool;
    fn is_chunk_contained(&self, chunk: ChunkPos) -> bool;
    fn is_block_contained_xz(&self, block: BlockPos) -> bool;
    fn is_block_contained_y(&self, block: BlockPos) -> bool;

    /// Whether all four corner columns of the chunk pass the x/z check.
    fn is_chunk_completely_contained(&self, chunk: ChunkPos) -> bool {
        let corner = BlockPos::new(chunk.x * 16, chunk.z * 16, 0);
        [(0, 0), (15, 0), (0, 15), (15, 15)]
            .into_iter()
            .all(|(dx, dz)| self.is_block_contained_xz(corner + BlockPos::new(dx, dz, 0)))
    }

    fn crop_unpopulated_chunks(&self) -> bool {
        false
    }

    fn block_mask(&self) -> Option<&BlockMask> {
        None
    }
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCrop;

impl Crop for NoCrop {
    fn is_region_contained(&self, _region: RegionPos) -> bool {
        true
    }

    fn is_chunk_contained(&self, _chunk: ChunkPos) -> bool {
        true
    }

    fn is_block_contained_xz(&self, _block: BlockPos) -> bool {
        true
    }

    fn is_block_contained_y(&self, _block: BlockPos) -> bool {
        true
    }
}

/// Inclusive range with optional ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    pub fn new(min: Option<T>, max: Option<T>) -> Self {
        Self { min, max }
    }

    pub fn unbounded() -> Self {
        Self { min: None, max: None }
    }

    pub fn contains(&self, value: T) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    CompletelyHidden,
    CompletelyShown,
    PartiallyHidden,
}

/// Visibility per block id and data value (65536 ids x 16 data values).
#[derive(Debug, Clone)]
pub struct BlockMask {
    mask: BitVec,
    states: Vec<BlockState>,
}

const IDS: usize = 65536;
const DATA_VALUES: usize = 16;

impl Default for BlockMask {
    fn default() -> Self {
        Self::new(true)
    }
}

impl BlockMask {
    pub fn new(shown: bool) -> Self {
        let state = if shown {
            BlockState::CompletelyShown
        } else {
            BlockState::CompletelyHidden
        };
        Self {
            mask: BitVec::repeat(shown, IDS * DATA_VALUES),
            states: vec![state; IDS],
        }
    }

    pub fn set(&mut self, id: u16, shown: bool) {
        let start = id as usize * DATA_VALUES;
        self.mask[start..start + DATA_VALUES].fill(shown);
        self.update_state(id);
    }

    /// Data values of 16 and above are ignored.
    pub fn set_data(&mut self, id: u16, data: u8, shown: bool) {
        if (data as usize) < DATA_VALUES {
            self.mask.set(id as usize * DATA_VALUES + data as usize, shown);
        }
        self.update_state(id);
    }

    pub fn set_range(&mut self, first: u16, last: u16, shown: bool) {
        for id in first..=last {
            self.set(id, shown);
        }
    }

    pub fn set_all(&mut self, shown: bool) {
        *self = Self::new(shown);
    }

    pub fn state(&self, id: u16) -> BlockState {
        self.states[id as usize]
    }

    pub fn is_hidden(&self, id: u16, data: u8) -> bool {
        if data as usize >= DATA_VALUES {
            log::warn!("Invalid data value {data} for block {id}");
            return false;
        }
        !self.mask[id as usize * DATA_VALUES + data as usize]
    }

    fn update_state(&mut self, id: u16) {
        let start = id as usize * DATA_VALUES;
        let bits = &self.mask[start..start + DATA_VALUES];
        self.states[id as usize] = if bits.all() {
            BlockState::CompletelyShown
        } else if bits.not_any() {
            BlockState::CompletelyHidden
        } else {
            BlockState::PartiallyHidden
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropShape {
    /// Per-axis block bounds; unbounded on every axis by default.
    #[default]
    Rectangular,
    Circular { center: BlockPos, radius: i32 },
}

/// Rectangular or circular crop with optional height limits.
#[derive(Debug, Clone, Default)]
pub struct WorldCrop {
    shape: CropShape,
    bounds_x: Bounds<i32>,
    bounds_z: Bounds<i32>,
    bounds_y: Bounds<i32>,
    bounds_chunk_x: Bounds<i32>,
    bounds_chunk_z: Bounds<i32>,
    bounds_region_x: Bounds<i32>,
    bounds_region_z: Bounds<i32>,
    crop_unpopulated: bool,
    block_mask: Option<BlockMask>,
}

impl WorldCrop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shape(&self) -> CropShape {
        self.shape
    }

    pub fn set_min_x(&mut self, value: i32) {
        self.bounds_x.min = Some(value);
        self.bounds_chunk_x.min = Some(value.div_euclid(16));
        self.bounds_region_x.min = Some(value.div_euclid(512));
        self.shape = CropShape::Rectangular;
    }

    pub fn set_max_x(&mut self, value: i32) {
        self.bounds_x.max = Some(value);
        self.bounds_chunk_x.max = Some(value.div_euclid(16));
        self.bounds_region_x.max = Some(value.div_euclid(512));
        self.shape = CropShape::Rectangular;
    }

    pub fn set_min_z(&mut self, value: i32) {
        self.bounds_z.min = Some(value);
        self.bounds_chunk_z.min = Some(value.div_euclid(16));
        self.bounds_region_z.min = Some(value.div_euclid(512));
        self.shape = CropShape::Rectangular;
    }

    pub fn set_max_z(&mut self, value: i32) {
        self.bounds_z.max = Some(value);
        self.bounds_chunk_z.max = Some(value.div_euclid(16));
        self.bounds_region_z.max = Some(value.div_euclid(512));
        self.shape = CropShape::Rectangular;
    }

    pub fn set_min_y(&mut self, value: i32) {
        self.bounds_y.min = Some(value);
    }

    pub fn set_max_y(&mut self, value: i32) {
        self.bounds_y.max = Some(value);
    }

    pub fn set_circular(&mut self, center: BlockPos, radius: i32) {
        self.shape = CropShape::Circular { center, radius };
    }

    pub fn set_crop_unpopulated_chunks(&mut self, crop: bool) {
        self.crop_unpopulated = crop;
    }

    pub fn set_block_mask(&mut self, mask: BlockMask) {
        self.block_mask = Some(mask);
    }

    // Squared distance from `center` to (x, z) is at most (radius + slack)^2.
    fn within_circle(center: BlockPos, radius: i32, slack: i64, x: i32, z: i32) -> bool {
        let dx = x as i64 - center.x as i64;
        let dz = z as i64 - center.z as i64;
        let reach = radius as i64 + slack;
        reach * reach >= dx * dx + dz * dz
    }
}

impl Crop for WorldCrop {
    fn is_region_contained(&self, region: RegionPos) -> bool {
        match self.shape {
            CropShape::Rectangular => {
                self.bounds_region_x.contains(region.x) && self.bounds_region_z.contains(region.z)
            }
            CropShape::Circular { center, radius } => Self::within_circle(
                center,
                radius,
                512,
                region.x * 512 + 256,
                region.z * 512 + 256,
            ),
        }
    }

    fn is_chunk_contained(&self, chunk: ChunkPos) -> bool {
        match self.shape {
            CropShape::Rectangular => {
                self.bounds_chunk_x.contains(chunk.x) && self.bounds_chunk_z.contains(chunk.z)
            }
            CropShape::Circular { center, radius } => {
                Self::within_circle(center, radius, 16, chunk.x * 16 + 8, chunk.z * 16 + 8)
            }
        }
    }

    fn is_block_contained_xz(&self, block: BlockPos) -> bool {
        match self.shape {
            CropShape::Rectangular => self.bounds_x.contains(block.x) && self.bounds_z.contains(block.z),
            CropShape::Circular { center, radius } => {
                Self::within_circle(center, radius, 0, block.x, block.z)
            }
        }
    }

    fn is_block_contained_y(&self, block: BlockPos) -> bool {
        self.bounds_y.contains(block.y)
    }

    fn crop_unpopulated_chunks(&self) -> bool {
        self.crop_unpopulated
    }

    fn block_mask(&self) -> Option<&BlockMask> {
        self.block_mask.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let bounds = Bounds::new(Some(-5), None);
        assert!(bounds.contains(-5));
        assert!(bounds.contains(i32::MAX));
        assert!(!bounds.contains(-6));
        assert!(Bounds::<i32>::unbounded().contains(i32::MIN));
    }

    #[test]
    fn test_default_crop_contains_everything() {
        let crop = WorldCrop::new();
        assert!(crop.is_region_contained(RegionPos::new(-100, 100)));
        assert!(crop.is_chunk_completely_contained(ChunkPos::new(7, -3)));
        assert!(crop.is_block_contained_y(BlockPos::new(0, 0, -64)));
        assert!(crop.block_mask().is_none());
    }

    #[test]
    fn test_rectangular_crop() {
        let mut crop = WorldCrop::new();
        crop.set_min_x(-20);
        crop.set_max_x(100);
        crop.set_min_z(0);
        crop.set_max_z(0);

        assert!(crop.is_region_contained(RegionPos::new(-1, 0)));
        assert!(!crop.is_region_contained(RegionPos::new(1, 0)));
        assert!(crop.is_chunk_contained(ChunkPos::new(-2, 0)));
        assert!(!crop.is_chunk_contained(ChunkPos::new(-3, 0)));
        assert!(!crop.is_chunk_contained(ChunkPos::new(0, -1)));
        assert!(crop.is_block_contained_xz(BlockPos::new(100, 0, 0)));
        assert!(!crop.is_block_contained_xz(BlockPos::new(101, 0, 0)));
        assert!(!crop.is_chunk_completely_contained(ChunkPos::new(0, 0)));
    }

    #[test]
    fn test_circular_crop() {
        let mut crop = WorldCrop::new();
        crop.set_circular(BlockPos::new(0, 0, 0), 100);

        assert!(crop.is_block_contained_xz(BlockPos::new(60, 80, 0)));
        assert!(!crop.is_block_contained_xz(BlockPos::new(61, 80, 0)));
        assert!(crop.is_chunk_contained(ChunkPos::new(6, 0)));
        assert!(!crop.is_chunk_contained(ChunkPos::new(8, 0)));
        assert!(crop.is_region_contained(RegionPos::new(-1, -1)));
        assert!(!crop.is_region_contained(RegionPos::new(2, 0)));
        assert!(crop.is_chunk_completely_contained(ChunkPos::new(0, 0)));
    }

    #[test]
    fn test_block_mask_states() {
        let mut mask = BlockMask::new(true);
        assert_eq!(mask.state(1), BlockState::CompletelyShown);

        mask.set_data(17, 3, false);
        assert_eq!(mask.state(17), BlockState::PartiallyHidden);
        assert!(mask.is_hidden(17, 3));
        assert!(!mask.is_hidden(17, 2));

        mask.set_range(7, 9, false);
        assert_eq!(mask.state(8), BlockState::CompletelyHidden);
        assert!(!mask.is_hidden(8, 16));

        mask.set_all(false);
        assert_eq!(mask.state(1), BlockState::CompletelyHidden);
    }
}
