//! A world save on disk and a direct-mapped cache over its regions and chunks.

pub mod cache;
pub mod world;

pub use cache::{Block, CacheConfig, CacheStats, WorldCache};
pub use world::{Dimension, RegionSource, World, WorldOptions};
