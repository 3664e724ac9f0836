use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use tilecraft_anvil::{BlockPos, ChunkPos, Crop, NoCrop, WorldCrop};
use tilecraft_metrics::ScanMetrics;
use tilecraft_nbt::{Compression, NbtFile};
use tilecraft_tiles::{SchedulerConfig, TileSet, TileSetOptions};
use tilecraft_world::{Dimension, World, WorldOptions};

#[derive(Parser)]
#[command(name = "tilecraft", about = "Scans Minecraft world saves and plans tile rendering")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scan a world and split the tiles to render between workers
    Plan(PlanArgs),
    /// Print the tag tree of one chunk
    DumpChunk(DumpChunkArgs),
}

#[derive(Args)]
pub struct WorldArgs {
    /// World directory (the one containing level.dat)
    #[arg(env = "TILECRAFT_WORLD")]
    pub world: PathBuf,

    /// Dimension: "overworld", "nether" or "end"
    #[arg(short, long, default_value = "overworld", env = "TILECRAFT_DIMENSION")]
    pub dimension: Dimension,

    /// Quarter turns of the map
    #[arg(short, long, default_value = "0", value_parser = clap::value_parser!(u8).range(0..=3), env = "TILECRAFT_ROTATION")]
    pub rotation: u8,

    #[command(flatten)]
    pub crop: CropArgs,
}

#[derive(Args)]
pub struct CropArgs {
    #[arg(long, allow_hyphen_values = true, env = "TILECRAFT_MIN_X")]
    pub min_x: Option<i32>,
    #[arg(long, allow_hyphen_values = true, env = "TILECRAFT_MAX_X")]
    pub max_x: Option<i32>,
    #[arg(long, allow_hyphen_values = true, env = "TILECRAFT_MIN_Z")]
    pub min_z: Option<i32>,
    #[arg(long, allow_hyphen_values = true, env = "TILECRAFT_MAX_Z")]
    pub max_z: Option<i32>,
    #[arg(long, allow_hyphen_values = true, env = "TILECRAFT_MIN_Y")]
    pub min_y: Option<i32>,
    #[arg(long, allow_hyphen_values = true, env = "TILECRAFT_MAX_Y")]
    pub max_y: Option<i32>,

    /// Center of a circular crop (block x)
    #[arg(long, allow_hyphen_values = true, requires_all = ["center_z", "radius"], env = "TILECRAFT_CENTER_X")]
    pub center_x: Option<i32>,
    /// Center of a circular crop (block z)
    #[arg(long, allow_hyphen_values = true, requires_all = ["center_x", "radius"], env = "TILECRAFT_CENTER_Z")]
    pub center_z: Option<i32>,
    /// Radius of a circular crop in blocks
    #[arg(long, requires_all = ["center_x", "center_z"], env = "TILECRAFT_RADIUS")]
    pub radius: Option<i32>,

    /// Hide chunks the game has not populated yet
    #[arg(long, env = "TILECRAFT_CROP_UNPOPULATED")]
    pub crop_unpopulated: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub world: WorldArgs,

    /// Number of render workers
    #[arg(short, long, default_value = "1", env = "TILECRAFT_WORKERS")]
    pub workers: usize,

    /// Only tiles changed at or after this unix time are required
    #[arg(long, conflicts_with = "output_dir", env = "TILECRAFT_SINCE")]
    pub since: Option<u32>,

    /// Only tiles whose image in this directory is missing or outdated are required
    #[arg(long, env = "TILECRAFT_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Extension of the tile images in --output-dir
    #[arg(long, default_value = "png", env = "TILECRAFT_IMAGE_EXTENSION")]
    pub image_extension: String,

    /// Quadtree depth, if deeper than the minimum
    #[arg(long, env = "TILECRAFT_DEPTH")]
    pub depth: Option<usize>,

    /// Print the plan as JSON
    #[arg(long, env = "TILECRAFT_JSON")]
    pub json: bool,
}

#[derive(Args)]
pub struct DumpChunkArgs {
    #[command(flatten)]
    pub world: WorldArgs,

    /// Chunk x (after rotation)
    #[arg(short = 'x', long, allow_hyphen_values = true)]
    pub chunk_x: i32,

    /// Chunk z (after rotation)
    #[arg(short = 'z', long, allow_hyphen_values = true)]
    pub chunk_z: i32,
}

impl CropArgs {
    fn is_empty(&self) -> bool {
        [
            self.min_x, self.max_x, self.min_z, self.max_z, self.min_y, self.max_y, self.radius,
        ]
        .iter()
        .all(Option::is_none)
            && !self.crop_unpopulated
    }

    fn build(&self) -> Arc<dyn Crop> {
        if self.is_empty() {
            return Arc::new(NoCrop);
        }
        let mut crop = WorldCrop::new();
        if let Some(v) = self.min_x {
            crop.set_min_x(v);
        }
        if let Some(v) = self.max_x {
            crop.set_max_x(v);
        }
        if let Some(v) = self.min_z {
            crop.set_min_z(v);
        }
        if let Some(v) = self.max_z {
            crop.set_max_z(v);
        }
        if let Some(v) = self.min_y {
            crop.set_min_y(v);
        }
        if let Some(v) = self.max_y {
            crop.set_max_y(v);
        }
        if let (Some(x), Some(z), Some(radius)) = (self.center_x, self.center_z, self.radius) {
            crop.set_circular(BlockPos::new(x, z, 0), radius);
        }
        crop.set_crop_unpopulated_chunks(self.crop_unpopulated);
        Arc::new(crop)
    }
}

impl WorldArgs {
    fn summary(&self) -> String {
        format!(
            "{}, {}, rotation {}",
            self.world.display(),
            self.dimension,
            self.rotation
        )
    }

    fn load(&self) -> Result<World> {
        let options = WorldOptions {
            dimension: self.dimension,
            rotation: self.rotation,
            crop: self.crop.build(),
        };
        let mut world = World::new(&self.world, options);
        world
            .load()
            .with_context(|| format!("Failed to load world {}", self.world.display()))?;
        Ok(world)
    }
}

fn plan(args: &PlanArgs) -> Result<()> {
    let world = args.world.load()?;
    let metrics = Arc::new(ScanMetrics::new(args.world.summary()));

    let mut tiles = TileSet::new(TileSetOptions {
        image_extension: args.image_extension.clone(),
        ..Default::default()
    });
    tiles.set_metrics(Arc::clone(&metrics));
    tiles.scan(&world);
    if let Some(depth) = args.depth {
        tiles.set_depth(depth);
    }
    if let Some(since) = args.since {
        tiles.scan_required_by_timestamp(since);
    } else if let Some(output_dir) = &args.output_dir {
        tiles.scan_required_by_filetimes(output_dir);
    }

    log::info!(
        "{} render tiles, {} composite tiles, depth {}",
        tiles.available_render_tiles().len(),
        tiles.available_composite_tiles().len(),
        tiles.depth()
    );
    let plan = tiles.find_render_tasks(args.workers, &SchedulerConfig::default());

    if args.json {
        let report = serde_json::json!({
            "world": args.world.world,
            "dimension": args.world.dimension.to_string(),
            "rotation": args.world.rotation,
            "regions": world.available_region_count(),
            "min_depth": tiles.min_depth(),
            "depth": tiles.depth(),
            "render_tiles": tiles.available_render_tiles().len(),
            "required_render_tiles": tiles.required_render_tiles_count(),
            "composite_tiles": tiles.available_composite_tiles().len(),
            "required_composite_tiles": tiles.required_composite_tiles_count(),
            "plan": plan,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("World: {}", args.world.summary());
    println!("Regions: {}", world.available_region_count());
    println!("Depth: {} (minimum {})", tiles.depth(), tiles.min_depth());
    println!(
        "Render tiles: {} required of {}",
        tiles.required_render_tiles_count(),
        tiles.available_render_tiles().len()
    );
    println!(
        "Composite tiles: {} required of {}",
        tiles.required_composite_tiles_count(),
        tiles.available_composite_tiles().len()
    );
    match plan.level {
        Some(level) => println!(
            "Work split on zoom level {level}, deviation {:.1}%, {} composite tiles left for the end",
            plan.deviation * 100.0,
            plan.remaining
        ),
        None => println!("Tree too shallow to split, everything is rendered in one go"),
    }
    for (i, worker) in plan.workers.iter().enumerate() {
        let roots: Vec<String> = worker.tiles.keys().map(ToString::to_string).collect();
        println!("  Worker {}: {} render tiles [{}]", i + 1, worker.cost, roots.join(", "));
    }
    println!();
    print!("{}", metrics.generate_report());
    Ok(())
}

fn dump_chunk(args: &DumpChunkArgs) -> Result<()> {
    let world = args.world.load()?;
    let pos = ChunkPos::new(args.chunk_x, args.chunk_z);
    let mut region = world
        .get_region(pos.region())
        .with_context(|| format!("Region {} of chunk {pos} not found", pos.region()))?;
    region
        .read_all()
        .with_context(|| format!("Failed to read {}", region.path().display()))?;
    if !region.has_chunk(pos) {
        anyhow::bail!("Chunk {pos} does not exist");
    }

    let method = region.chunk_compression(pos);
    let compression = Compression::from_byte(method)
        .with_context(|| format!("Unknown compression method {method}"))?;
    let file = NbtFile::from_bytes(region.chunk_data(pos), compression)
        .with_context(|| format!("Failed to decode chunk {pos}"))?;
    println!("Chunk {pos} ({compression:?}, timestamp {})", region.chunk_timestamp(pos));
    print!("{}", file.root);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Command::Plan(args) => plan(args),
        Command::DumpChunk(args) => dump_chunk(args),
    }
}
