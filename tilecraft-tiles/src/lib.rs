//! The tile quadtree of a world and the split of its rendering work.

pub mod path;
pub mod scheduler;
pub mod tileset;

pub use path::{TilePath, TilePos};
pub use scheduler::{RenderPlan, SchedulerConfig, WorkerTasks};
pub use tileset::{TileSet, TileSetOptions, chunk_tiles, min_depth_for};
