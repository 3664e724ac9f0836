use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Serialize, Serializer};

/// Position of a render tile on the deepest quadtree level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for TilePos {
    type Output = TilePos;

    fn add(self, other: TilePos) -> TilePos {
        TilePos::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for TilePos {
    type Output = TilePos;

    fn sub(self, other: TilePos) -> TilePos {
        TilePos::new(self.x - other.x, self.y - other.y)
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

/// Path from the quadtree root to a tile. Each step picks a child:
/// 1 top left, 2 top right, 3 bottom left, 4 bottom right.
/// The path length is the zoom level.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TilePath {
    steps: Vec<u8>,
}

impl TilePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// `None` if any step is outside `1..=4`.
    pub fn new(steps: Vec<u8>) -> Option<Self> {
        steps
            .iter()
            .all(|step| (1..=4).contains(step))
            .then_some(Self { steps })
    }

    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[u8] {
        &self.steps
    }

    /// The enclosing tile, or `None` for the root.
    pub fn parent(&self) -> Option<TilePath> {
        let (_, rest) = self.steps.split_last()?;
        Some(TilePath {
            steps: rest.to_vec(),
        })
    }

    /// Child `node` (1..=4) of this tile.
    pub fn child(&self, node: u8) -> TilePath {
        debug_assert!((1..=4).contains(&node));
        let mut steps = self.steps.clone();
        steps.push(node);
        TilePath { steps }
    }

    pub fn children(&self) -> impl Iterator<Item = TilePath> + '_ {
        (1..=4).map(|node| self.child(node))
    }

    /// Position of this tile among all tiles of its zoom level.
    pub fn tile_pos(&self) -> TilePos {
        let mut radius = (1i32 << self.steps.len()) / 2;
        let mut x = -radius;
        let mut y = -radius;
        for step in &self.steps {
            if *step == 2 || *step == 4 {
                x += radius;
            }
            if *step == 3 || *step == 4 {
                y += radius;
            }
            radius /= 2;
        }
        TilePos::new(x, y)
    }

    /// Path of the tile at `pos` on zoom level `depth`, found by halving
    /// the bounds once per level. `None` if `pos` does not fit.
    pub fn from_tile_pos(pos: TilePos, depth: usize) -> Option<TilePath> {
        if depth >= 31 {
            return None;
        }
        let radius = (1i32 << depth) / 2;
        let (mut left, mut right) = (-radius, radius);
        let (mut bottom, mut top) = (-radius, radius);

        let mut steps = Vec::with_capacity(depth);
        for _ in 0..depth {
            let middle_x = (left + right) / 2;
            let middle_y = (top + bottom) / 2;
            let step = match (pos.x < middle_x, pos.y < middle_y) {
                (true, true) => {
                    right = middle_x;
                    top = middle_y;
                    1
                }
                (true, false) => {
                    right = middle_x;
                    bottom = middle_y;
                    3
                }
                (false, true) => {
                    left = middle_x;
                    top = middle_y;
                    2
                }
                (false, false) => {
                    left = middle_x;
                    bottom = middle_y;
                    4
                }
            };
            steps.push(step);
        }

        let path = TilePath { steps };
        (path.tile_pos() == pos).then_some(path)
    }

    /// Name of the tile image inside an output directory, without extension.
    /// The root tile is `base`.
    pub fn file_stem(&self) -> String {
        if self.steps.is_empty() {
            "base".to_string()
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for TilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

impl FromStr for TilePath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(TilePath::root());
        }
        let mut steps = Vec::new();
        for part in s.split('/') {
            match part.parse::<u8>() {
                Ok(step @ 1..=4) => steps.push(step),
                _ => bail!("Invalid tile path '{s}': '{part}' is not one of 1, 2, 3, 4"),
            }
        }
        Ok(TilePath { steps })
    }
}

impl Serialize for TilePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
