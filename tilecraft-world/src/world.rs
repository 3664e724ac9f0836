use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tilecraft_anvil::{Crop, NoCrop, RegionFile, RegionPos};

/// Source of region file handles, keyed by rotated region position.
pub trait RegionSource {
    /// A handle for `pos` with rotation and crop applied but nothing read
    /// yet, or `None` if the world has no such region.
    fn open_region(&self, pos: RegionPos) -> Result<Option<RegionFile>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dimension {
    #[default]
    Overworld,
    Nether,
    End,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Overworld => "overworld",
            Dimension::Nether => "nether",
            Dimension::End => "end",
        };
        f.write_str(name)
    }
}

impl FromStr for Dimension {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "overworld" => Ok(Dimension::Overworld),
            "nether" => Ok(Dimension::Nether),
            "end" => Ok(Dimension::End),
            other => bail!("Unknown dimension '{other}' (expected overworld, nether or end)"),
        }
    }
}

#[derive(Clone)]
pub struct WorldOptions {
    pub dimension: Dimension,
    /// Quarter turns, 0..=3.
    pub rotation: u8,
    pub crop: Arc<dyn Crop>,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self {
            dimension: Dimension::Overworld,
            rotation: 0,
            crop: Arc::new(NoCrop),
        }
    }
}

impl fmt::Debug for WorldOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldOptions")
            .field("dimension", &self.dimension)
            .field("rotation", &self.rotation)
            .finish_non_exhaustive()
    }
}

/// The region files of one dimension of a world save.
#[derive(Debug)]
pub struct World {
    world_dir: PathBuf,
    region_dir: PathBuf,
    options: WorldOptions,
    region_files: BTreeMap<RegionPos, PathBuf>,
}

/// Region directory of `dimension`. Bukkit servers keep nether and end in
/// sibling world directories; those win when they exist.
fn resolve_region_dir(world_dir: &Path, dimension: Dimension) -> PathBuf {
    let (suffix, dim) = match dimension {
        Dimension::Overworld => return world_dir.join("region"),
        Dimension::Nether => ("_nether", "DIM-1"),
        Dimension::End => ("_the_end", "DIM1"),
    };
    let world_name = world_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(parent) = world_dir.parent() {
        let bukkit = parent
            .join(format!("{world_name}{suffix}"))
            .join(dim)
            .join("region");
        if bukkit.exists() {
            return bukkit;
        }
    }
    world_dir.join(dim).join("region")
}

impl World {
    pub fn new(world_dir: impl Into<PathBuf>, options: WorldOptions) -> Self {
        let world_dir = world_dir.into();
        let region_dir = resolve_region_dir(&world_dir, options.dimension);
        Self {
            world_dir,
            region_dir,
            options: WorldOptions {
                rotation: options.rotation % 4,
                ..options
            },
            region_files: BTreeMap::new(),
        }
    }

    /// Scans the region directory. Files not named `r.<x>.<z>.mca` and
    /// regions outside the crop are skipped.
    pub fn load(&mut self) -> Result<()> {
        if !self.world_dir.is_dir() {
            bail!("World directory {} does not exist", self.world_dir.display());
        }
        if !self.region_dir.is_dir() {
            bail!("Region directory {} does not exist", self.region_dir.display());
        }

        self.region_files.clear();
        let entries = fs::read_dir(&self.region_dir)
            .with_context(|| format!("Failed to list {}", self.region_dir.display()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to list {}", self.region_dir.display()))?
                .path();
            if path.extension().is_none_or(|ext| ext != "mca") {
                continue;
            }
            let Ok(pos) = RegionPos::by_filename(&path) else {
                log::debug!("Ignoring {}", path.display());
                continue;
            };
            if !self.options.crop.is_region_contained(pos) {
                continue;
            }
            self.region_files.insert(pos.rotate(self.options.rotation), path);
        }
        log::info!(
            "Found {} regions in {}",
            self.region_files.len(),
            self.region_dir.display()
        );
        Ok(())
    }

    pub fn world_dir(&self) -> &Path {
        &self.world_dir
    }

    pub fn region_dir(&self) -> &Path {
        &self.region_dir
    }

    pub fn dimension(&self) -> Dimension {
        self.options.dimension
    }

    pub fn rotation(&self) -> u8 {
        self.options.rotation
    }

    pub fn crop(&self) -> &Arc<dyn Crop> {
        &self.options.crop
    }

    /// Rotated positions of all regions found by [`load`](Self::load).
    pub fn available_regions(&self) -> impl Iterator<Item = RegionPos> + '_ {
        self.region_files.keys().copied()
    }

    pub fn available_region_count(&self) -> usize {
        self.region_files.len()
    }

    pub fn has_region(&self, pos: RegionPos) -> bool {
        self.region_files.contains_key(&pos)
    }

    pub fn region_path(&self, pos: RegionPos) -> Option<&Path> {
        self.region_files.get(&pos).map(PathBuf::as_path)
    }

    /// Handle for a scanned region, with this world's rotation and crop.
    pub fn get_region(&self, pos: RegionPos) -> Option<RegionFile> {
        let path = self.region_files.get(&pos)?;
        match RegionFile::new(path) {
            Ok(mut region) => {
                region.set_rotation(self.options.rotation);
                region.set_crop(Arc::clone(&self.options.crop));
                Some(region)
            }
            Err(err) => {
                log::error!("Unable to open region {}: {err}", path.display());
                None
            }
        }
    }
}

impl RegionSource for World {
    fn open_region(&self, pos: RegionPos) -> Result<Option<RegionFile>> {
        Ok(self.get_region(pos))
    }
}
