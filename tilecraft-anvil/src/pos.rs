//! Region, chunk and block coordinates.
//!
//! Rotation turns the world in 90 degree steps: `x' = -z`, `z' = x` for
//! regions, and the matching turn inside a region (`31 - z`, `x`) and inside
//! a chunk (`15 - z`, `x`) so that all three levels stay consistent.

use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

use crate::error::RegionError;

/// Chunks along one side of a region.
pub const REGION_CHUNKS: i32 = 32;
/// Blocks along one side of a chunk.
pub const CHUNK_BLOCKS: i32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Parses an `r.<x>.<z>.mca` file name. Leading directories are ignored.
    pub fn by_filename(path: impl AsRef<Path>) -> Result<Self, RegionError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RegionError::InvalidFilename(path.display().to_string()))?;
        let invalid = || RegionError::InvalidFilename(name.to_string());

        let coords = name
            .strip_prefix("r.")
            .and_then(|rest| rest.strip_suffix(".mca"))
            .ok_or_else(invalid)?;
        let (x, z) = coords.split_once('.').ok_or_else(invalid)?;
        let x = x.parse().map_err(|_| invalid())?;
        let z = z.parse().map_err(|_| invalid())?;
        Ok(Self { x, z })
    }

    pub fn filename(&self) -> String {
        format!("r.{}.{}.mca", self.x, self.z)
    }

    pub fn rotate(self, rotation: u8) -> Self {
        let mut pos = self;
        for _ in 0..rotation % 4 {
            pos = Self::new(-pos.z, pos.x);
        }
        pos
    }
}

impl fmt::Display for RegionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn from_region_local(region: RegionPos, local_x: i32, local_z: i32) -> Self {
        Self::new(region.x * REGION_CHUNKS + local_x, region.z * REGION_CHUNKS + local_z)
    }

    pub fn local_x(&self) -> i32 {
        self.x.rem_euclid(REGION_CHUNKS)
    }

    pub fn local_z(&self) -> i32 {
        self.z.rem_euclid(REGION_CHUNKS)
    }

    pub fn region(&self) -> RegionPos {
        RegionPos::new(self.x >> 5, self.z >> 5)
    }

    /// Index into a region file's header tables.
    pub fn region_index(&self) -> usize {
        (self.local_z() * REGION_CHUNKS + self.local_x()) as usize
    }

    pub fn row(&self) -> i32 {
        self.z - self.x
    }

    pub fn col(&self) -> i32 {
        self.x + self.z
    }

    pub fn by_row_col(row: i32, col: i32) -> Self {
        Self::new((col - row) / 2, (col + row) / 2)
    }

    /// Turns the containing region and the position inside it together.
    pub fn rotate(self, rotation: u8) -> Self {
        let rotation = rotation % 4;
        let region = self.region().rotate(rotation);
        let (mut lx, mut lz) = (self.local_x(), self.local_z());
        for _ in 0..rotation {
            (lx, lz) = (REGION_CHUNKS - 1 - lz, lx);
        }
        Self::from_region_local(region, lx, lz)
    }
}

impl From<BlockPos> for ChunkPos {
    fn from(block: BlockPos) -> Self {
        Self::new(
            block.x.div_euclid(CHUNK_BLOCKS),
            block.z.div_euclid(CHUNK_BLOCKS),
        )
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.z)
    }
}

/// Orders blocks the way they are drawn: bottom to top, then east to west,
/// then north to south.
fn draw_order(a: (i32, i32, i32), b: (i32, i32, i32)) -> Ordering {
    let (ax, az, ay) = a;
    let (bx, bz, by) = b;
    ay.cmp(&by)
        .then_with(|| bx.cmp(&ax))
        .then_with(|| az.cmp(&bz))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockPos {
    pub x: i32,
    pub z: i32,
    pub y: i32,
}

impl BlockPos {
    pub const NORTH: BlockPos = BlockPos::new(0, -1, 0);
    pub const SOUTH: BlockPos = BlockPos::new(0, 1, 0);
    pub const EAST: BlockPos = BlockPos::new(1, 0, 0);
    pub const WEST: BlockPos = BlockPos::new(-1, 0, 0);
    pub const TOP: BlockPos = BlockPos::new(0, 0, 1);
    pub const BOTTOM: BlockPos = BlockPos::new(0, 0, -1);

    pub const fn new(x: i32, z: i32, y: i32) -> Self {
        Self { x, z, y }
    }

    pub fn row(&self) -> i32 {
        self.z - self.x + (256 - self.y) * 4
    }

    pub fn col(&self) -> i32 {
        self.x + self.z
    }
}

impl std::ops::Add for BlockPos {
    type Output = BlockPos;

    fn add(self, other: BlockPos) -> BlockPos {
        BlockPos::new(self.x + other.x, self.z + other.z, self.y + other.y)
    }
}

impl std::ops::Sub for BlockPos {
    type Output = BlockPos;

    fn sub(self, other: BlockPos) -> BlockPos {
        BlockPos::new(self.x - other.x, self.z - other.z, self.y - other.y)
    }
}

impl Ord for BlockPos {
    fn cmp(&self, other: &Self) -> Ordering {
        draw_order((self.x, self.z, self.y), (other.x, other.z, other.y))
    }
}

impl PartialOrd for BlockPos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.x, self.z, self.y)
    }
}

/// A block inside a chunk: `x`/`z` in `0..16`, `y` the world height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LocalBlockPos {
    pub x: i32,
    pub z: i32,
    pub y: i32,
}

impl LocalBlockPos {
    pub fn new(x: i32, z: i32, y: i32) -> Self {
        Self { x, z, y }
    }

    pub fn row(&self) -> i32 {
        self.z - self.x + (256 - self.y) * 4
    }

    pub fn col(&self) -> i32 {
        self.x + self.z
    }

    pub fn to_global(&self, chunk: ChunkPos) -> BlockPos {
        BlockPos::new(
            self.x + chunk.x * CHUNK_BLOCKS,
            self.z + chunk.z * CHUNK_BLOCKS,
            self.y,
        )
    }

    pub fn rotate(self, rotation: u8) -> Self {
        let (mut x, mut z) = (self.x, self.z);
        for _ in 0..rotation % 4 {
            (x, z) = (CHUNK_BLOCKS - 1 - z, x);
        }
        Self::new(x, z, self.y)
    }

    /// Undoes [`LocalBlockPos::rotate`] with the same count.
    pub fn unrotate(self, rotation: u8) -> Self {
        self.rotate((4 - rotation % 4) % 4)
    }
}

impl From<BlockPos> for LocalBlockPos {
    fn from(pos: BlockPos) -> Self {
        Self::new(
            pos.x.rem_euclid(CHUNK_BLOCKS),
            pos.z.rem_euclid(CHUNK_BLOCKS),
            pos.y,
        )
    }
}

impl Ord for LocalBlockPos {
    fn cmp(&self, other: &Self) -> Ordering {
        draw_order((self.x, self.z, self.y), (other.x, other.z, other.y))
    }
}

impl PartialOrd for LocalBlockPos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LocalBlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.x, self.z, self.y)
    }
}
