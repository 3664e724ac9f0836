//! Anvil world data: coordinates, crops, region files and chunks.

pub mod chunk;
pub mod crop;
pub mod error;
pub mod pos;
pub mod region;

pub use chunk::{Chunk, ChunkBuilder, ChunkSection, LightingData};
pub use crop::{BlockMask, Bounds, Crop, CropShape, NoCrop, WorldCrop};
pub use error::RegionError;
pub use pos::{BlockPos, ChunkPos, LocalBlockPos, RegionPos};
pub use region::{ChunkStatus, RegionFile};
