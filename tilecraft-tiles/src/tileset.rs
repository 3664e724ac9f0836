use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, UNIX_EPOCH};

use tilecraft_anvil::ChunkPos;
use tilecraft_anvil::chunk::CHUNK_HEIGHT;
use tilecraft_metrics::ScanMetrics;
use tilecraft_world::World;

use crate::path::{TilePath, TilePos};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSetOptions {
    /// Width of a render tile in chunks.
    pub tile_width: i32,
    /// Extension of the tile images checked by
    /// [`TileSet::scan_required_by_filetimes`].
    pub image_extension: String,
}

impl Default for TileSetOptions {
    fn default() -> Self {
        Self {
            tile_width: 1,
            image_extension: "png".to_string(),
        }
    }
}

/// Adds the tiles covering one row/column of the isometric projection.
/// Coordinates on a tile border also claim the neighbouring tiles.
fn add_row_col_tiles(row: i32, col: i32, tile_width: i32, tiles: &mut BTreeSet<TilePos>) {
    let x = col / (2 * tile_width);
    let y = row / (4 * tile_width);
    tiles.insert(TilePos::new(x, y));

    let edge_col = col % (2 * tile_width) == 0;
    let edge_row = row % (4 * tile_width) == 0;
    if edge_col {
        tiles.insert(TilePos::new(x - 1, y));
    }
    if edge_row {
        tiles.insert(TilePos::new(x, y - 1));
    }
    if edge_col && edge_row {
        tiles.insert(TilePos::new(x - 1, y - 1));
    }
}

/// Render tiles a chunk column covers, from its top down to one section
/// below its bottom.
pub fn chunk_tiles(chunk: ChunkPos, tile_width: i32) -> BTreeSet<TilePos> {
    let (row, col) = (chunk.row(), chunk.col());
    let mut tiles = BTreeSet::new();
    for i in 0..=CHUNK_HEIGHT as i32 {
        add_row_col_tiles(row + 2 * i, col, tile_width, &mut tiles);
    }
    tiles
}

/// Smallest depth whose render tiles span every coordinate with
/// `|c| <= max_abs`.
pub fn min_depth_for(max_abs: i32) -> usize {
    let mut depth = 0;
    // Depth d covers |c| < 2^(d-1); depth 0 holds only the origin.
    while depth < 32 && max_abs != 0 && (1i64 << depth) / 2 <= max_abs as i64 {
        depth += 1;
    }
    depth
}

/// The quadtree of tiles for one world: which tiles exist and which must be
/// rendered again.
///
/// Render tiles sit on the deepest level and are keyed by [`TilePos`];
/// composite tiles are keyed by [`TilePath`] and exist wherever one of their
/// children does.
#[derive(Debug, Default)]
pub struct TileSet {
    options: TileSetOptions,
    min_depth: usize,
    depth: usize,
    tile_timestamps: BTreeMap<TilePos, u32>,
    render_tiles: BTreeSet<TilePos>,
    required_render_tiles: BTreeSet<TilePos>,
    composite_tiles: BTreeSet<TilePath>,
    required_composite_tiles: BTreeSet<TilePath>,
    containing_render_tiles: BTreeMap<TilePath, usize>,
    metrics: Option<Arc<ScanMetrics>>,
}

impl TileSet {
    pub fn new(options: TileSetOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn set_metrics(&mut self, metrics: Arc<ScanMetrics>) {
        self.metrics = Some(metrics);
    }

    pub fn options(&self) -> &TileSetOptions {
        &self.options
    }

    /// Collects the render tiles of every chunk in `world` from the region
    /// headers. Every tile starts out required and the depth is reset to
    /// the minimum.
    pub fn scan(&mut self, world: &World) {
        self.tile_timestamps.clear();
        self.render_tiles.clear();

        for pos in world.available_regions() {
            let Some(mut region) = world.get_region(pos) else {
                self.record_skipped();
                continue;
            };
            let start = Instant::now();
            if let Err(err) = region.read_headers() {
                log::warn!("Skipping region {}: {err}", region.path().display());
                self.record_skipped();
                continue;
            }
            if let Some(metrics) = &self.metrics {
                metrics.record_region_read(start.elapsed(), region.containing_chunks_count());
            }

            for &chunk in region.containing_chunks() {
                let timestamp = region.chunk_timestamp(chunk);
                for tile in chunk_tiles(chunk, self.options.tile_width) {
                    self.add_render_tile(tile, timestamp);
                }
            }
            log::debug!(
                "Scanned region {pos}: {} chunks",
                region.containing_chunks_count()
            );
        }

        self.required_render_tiles = self.render_tiles.clone();
        self.min_depth = self.compute_min_depth();
        self.depth = self.min_depth;
        self.update_composite_tiles();
        log::info!(
            "Found {} render tiles, minimum depth {}",
            self.render_tiles.len(),
            self.min_depth
        );
    }

    /// Adds one render tile, keeping the newest chunk timestamp seen for it.
    pub fn add_render_tile(&mut self, tile: TilePos, timestamp: u32) {
        self.tile_timestamps
            .entry(tile)
            .and_modify(|t| *t = (*t).max(timestamp))
            .or_insert(timestamp);
        self.render_tiles.insert(tile);
    }

    /// Recomputes depth and composite tiles after tiles were added with
    /// [`add_render_tile`](Self::add_render_tile). Every tile is required.
    pub fn finish(&mut self) {
        self.required_render_tiles = self.render_tiles.clone();
        self.min_depth = self.compute_min_depth();
        self.depth = self.min_depth;
        self.update_composite_tiles();
    }

    fn record_skipped(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_region_skipped();
        }
    }

    fn compute_min_depth(&self) -> usize {
        let max_abs = self
            .render_tiles
            .iter()
            .map(|tile| tile.x.unsigned_abs().max(tile.y.unsigned_abs()))
            .max()
            .unwrap_or(0);
        min_depth_for(i32::try_from(max_abs).unwrap_or(i32::MAX))
    }

    /// Marks render tiles whose newest chunk changed at or after `last_change`
    /// (unix seconds).
    pub fn scan_required_by_timestamp(&mut self, last_change: u32) {
        self.required_render_tiles = self
            .tile_timestamps
            .iter()
            .filter(|&(_, &timestamp)| timestamp >= last_change)
            .map(|(&tile, _)| tile)
            .collect();
        self.update_required_composite_tiles();
    }

    /// Marks render tiles whose image in `output_dir` is missing or older
    /// than their newest chunk.
    pub fn scan_required_by_filetimes(&mut self, output_dir: &Path) {
        let mut required = BTreeSet::new();
        for (&tile, &timestamp) in &self.tile_timestamps {
            let Some(path) = TilePath::from_tile_pos(tile, self.depth) else {
                required.insert(tile);
                continue;
            };
            let file = output_dir.join(format!(
                "{}.{}",
                path.file_stem(),
                self.options.image_extension
            ));
            let modified = fs::metadata(&file)
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                .map(|age| age.as_secs());
            match modified {
                Some(secs) if secs >= timestamp as u64 => {}
                _ => {
                    required.insert(tile);
                }
            }
        }
        self.required_render_tiles = required;
        self.update_required_composite_tiles();
    }

    /// Smallest depth that fits every render tile.
    pub fn min_depth(&self) -> usize {
        self.min_depth
    }

    /// Depth in use, i.e. the zoom level of the render tiles.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Uses a deeper quadtree than necessary. Depths below the minimum are
    /// ignored.
    pub fn set_depth(&mut self, depth: usize) {
        if depth < self.min_depth {
            log::warn!(
                "Ignoring depth {depth}, at least {} is required",
                self.min_depth
            );
            return;
        }
        if depth == self.depth {
            return;
        }
        self.depth = depth;
        self.update_composite_tiles();
    }

    // Parents of every tile in `render_tiles`, up to the root.
    fn composite_tiles_of(&self, render_tiles: &BTreeSet<TilePos>) -> BTreeSet<TilePath> {
        let mut tiles = BTreeSet::new();
        if self.depth == 0 {
            return tiles;
        }
        let mut level: BTreeSet<TilePath> = render_tiles
            .iter()
            .filter_map(|&tile| TilePath::from_tile_pos(tile, self.depth))
            .filter_map(|path| path.parent())
            .collect();
        while !level.is_empty() {
            let parents = level.iter().filter_map(TilePath::parent).collect();
            tiles.append(&mut level);
            level = parents;
        }
        tiles
    }

    fn update_composite_tiles(&mut self) {
        self.composite_tiles = self.composite_tiles_of(&self.render_tiles);
        self.update_required_composite_tiles();
    }

    fn update_required_composite_tiles(&mut self) {
        self.required_composite_tiles = self.composite_tiles_of(&self.required_render_tiles);

        let mut counts: BTreeMap<TilePath, usize> = self
            .composite_tiles
            .iter()
            .map(|path| (path.clone(), 0))
            .collect();
        for &tile in &self.required_render_tiles {
            let Some(mut path) = TilePath::from_tile_pos(tile, self.depth) else {
                continue;
            };
            while let Some(parent) = path.parent() {
                *counts.entry(parent.clone()).or_insert(0) += 1;
                path = parent;
            }
        }
        self.containing_render_tiles = counts;
    }

    pub fn has_tile(&self, path: &TilePath) -> bool {
        if path.depth() == self.depth {
            self.render_tiles.contains(&path.tile_pos())
        } else {
            self.composite_tiles.contains(path)
        }
    }

    pub fn is_tile_required(&self, path: &TilePath) -> bool {
        if path.depth() == self.depth {
            self.required_render_tiles.contains(&path.tile_pos())
        } else {
            self.required_composite_tiles.contains(path)
        }
    }

    pub fn available_render_tiles(&self) -> &BTreeSet<TilePos> {
        &self.render_tiles
    }

    pub fn required_render_tiles(&self) -> &BTreeSet<TilePos> {
        &self.required_render_tiles
    }

    pub fn available_composite_tiles(&self) -> &BTreeSet<TilePath> {
        &self.composite_tiles
    }

    pub fn required_composite_tiles(&self) -> &BTreeSet<TilePath> {
        &self.required_composite_tiles
    }

    pub fn required_render_tiles_count(&self) -> usize {
        self.required_render_tiles.len()
    }

    pub fn required_composite_tiles_count(&self) -> usize {
        self.required_composite_tiles.len()
    }

    /// Newest chunk timestamp of a render tile.
    pub fn tile_timestamp(&self, tile: TilePos) -> Option<u32> {
        self.tile_timestamps.get(&tile).copied()
    }

    /// Number of required render tiles below a composite tile.
    pub fn containing_render_tiles(&self, path: &TilePath) -> usize {
        self.containing_render_tiles.get(path).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_set(tiles: &[(i32, i32, u32)]) -> TileSet {
        let mut set = TileSet::new(TileSetOptions::default());
        for &(x, y, timestamp) in tiles {
            set.add_render_tile(TilePos::new(x, y), timestamp);
        }
        set.finish();
        set
    }

    #[test]
    fn test_row_col_edges() {
        let mut tiles = BTreeSet::new();
        add_row_col_tiles(5, 3, 1, &mut tiles);
        assert_eq!(tiles, [TilePos::new(1, 1)].into());

        let mut tiles = BTreeSet::new();
        add_row_col_tiles(4, 2, 1, &mut tiles);
        let expected: BTreeSet<_> = [
            TilePos::new(1, 1),
            TilePos::new(0, 1),
            TilePos::new(1, 0),
            TilePos::new(0, 0),
        ]
        .into();
        assert_eq!(tiles, expected);
    }

    #[test]
    fn test_chunk_tiles_of_origin() {
        let tiles = chunk_tiles(ChunkPos::new(0, 0), 1);
        // Rows 0..=32 in steps of 2 on column 0.
        assert!(tiles.contains(&TilePos::new(0, 0)));
        assert!(tiles.contains(&TilePos::new(-1, -1)));
        assert!(tiles.contains(&TilePos::new(-1, 8)));
        assert!(!tiles.contains(&TilePos::new(1, 0)));
        assert_eq!(tiles.len(), 20);
    }

    #[test]
    fn test_min_depth() {
        assert_eq!(min_depth_for(0), 0);
        assert_eq!(min_depth_for(1), 2);
        assert_eq!(min_depth_for(2), 3);
        assert_eq!(min_depth_for(3), 3);
        assert_eq!(min_depth_for(4), 4);
        for m in 1..2000 {
            let d = min_depth_for(m) as u32;
            assert!(1i64 << (d - 1) > m as i64);
            assert!(1i64 << (d - 2) <= m as i64);
        }
    }

    #[test]
    fn test_single_origin_tile_has_no_composites() {
        let set = tile_set(&[(0, 0, 1)]);
        assert_eq!(set.depth(), 0);
        assert!(set.available_composite_tiles().is_empty());
        assert!(set.has_tile(&TilePath::root()));
        assert!(set.is_tile_required(&TilePath::root()));
    }

    #[test]
    fn test_composites_and_counts() {
        let set = tile_set(&[(-2, -2, 1), (1, 1, 2), (-1, 0, 3)]);
        assert_eq!(set.depth(), 3);
        let root = TilePath::root();
        assert!(set.has_tile(&root));
        assert_eq!(set.containing_render_tiles(&root), 3);

        let leaf = TilePath::from_tile_pos(TilePos::new(1, 1), 3).unwrap();
        assert!(set.has_tile(&leaf));
        let parent = leaf.parent().unwrap();
        assert!(set.has_tile(&parent));
        assert_eq!(set.containing_render_tiles(&parent), 1);

        // Every composite has at least one existing child.
        for path in set.available_composite_tiles() {
            assert!(path.children().any(|child| set.has_tile(&child)));
        }
    }

    #[test]
    fn test_required_by_timestamp() {
        let mut set = tile_set(&[(-2, -2, 10), (1, 1, 20), (-1, 0, 30)]);
        set.scan_required_by_timestamp(20);
        assert_eq!(set.required_render_tiles_count(), 2);
        assert!(!set.required_render_tiles().contains(&TilePos::new(-2, -2)));

        let stale = TilePath::from_tile_pos(TilePos::new(-2, -2), 3).unwrap();
        assert!(set.has_tile(&stale));
        assert!(!set.is_tile_required(&stale));
        assert!(!set.is_tile_required(&stale.parent().unwrap()));
        assert_eq!(set.containing_render_tiles(&TilePath::root()), 2);

        set.scan_required_by_timestamp(31);
        assert_eq!(set.required_render_tiles_count(), 0);
        assert_eq!(set.required_composite_tiles_count(), 0);
    }

    #[test]
    fn test_deeper_depth() {
        let mut set = tile_set(&[(1, 1, 1), (-1, -1, 1)]);
        assert_eq!(set.min_depth(), 2);
        set.set_depth(4);
        assert_eq!(set.depth(), 4);
        assert_eq!(set.containing_render_tiles(&TilePath::root()), 2);
        let leaf = TilePath::from_tile_pos(TilePos::new(1, 1), 4).unwrap();
        assert_eq!(leaf.depth(), 4);
        assert!(set.has_tile(&leaf));

        set.set_depth(1);
        assert_eq!(set.depth(), 4);
    }
}
