use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tilegrid_common::GridCoord;
use tilegrid_map::{TileGrid, TilemapConfig};
use tilegrid_render::{FlyCamera, RecordingContext, Tilemap, TilemapResources};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tilegrid-cli", about = "CLI tool for tilegrid inspection")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON tilemap config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the effective tilemap config
    Info,
    /// Build a grid and print its extent and a sample of its instances
    Grid {
        /// Tiles per grid edge (overrides the config file)
        #[arg(short, long)]
        grid_size: Option<u32>,
        /// Number of instances to print from each end of the buffer
        #[arg(short, long, default_value = "4")]
        sample: usize,
    },
    /// Render frames against a recording backend and print the command trace
    Frames {
        /// Tiles per grid edge (overrides the config file)
        #[arg(short, long)]
        grid_size: Option<u32>,
        /// Number of frames to render
        #[arg(short, long, default_value = "2")]
        count: u32,
        /// Roll added to the tilemap each frame, in degrees
        #[arg(long, default_value = "15")]
        roll_step: f32,
    },
}

fn with_grid_size(mut config: TilemapConfig, grid_size: Option<u32>) -> TilemapConfig {
    if let Some(n) = grid_size {
        config.grid_size = n;
    }
    config
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = TilemapConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => {
            println!("tilegrid-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("render: {}", tilegrid_render::crate_info());
            println!(
                "config: tile_size={} grid_size={} tile_type={} variant={}",
                config.tile_size, config.grid_size, config.tile_type, config.variant
            );
        }
        Commands::Grid { grid_size, sample } => {
            let config = with_grid_size(config, grid_size);
            let grid =
                TileGrid::with_default_tiles(config.grid_size, &config.tile_type, config.variant)?;
            let (min, max) = grid.bounds();

            println!("Grid: {0} x {0}, {1} tiles", grid.size(), grid.len());
            println!("Coordinates: [{min}, {max}) on both axes");
            println!("Instance buffer: {} bytes", grid.instance_bytes().len());

            let instances = grid.instances();
            let head = sample.min(instances.len());
            let tail_start = instances.len().saturating_sub(sample).max(head);
            for (idx, inst) in instances[..head]
                .iter()
                .enumerate()
                .chain(instances.iter().enumerate().skip(tail_start))
            {
                let [x, y, z] = inst.offset;
                let coord = GridCoord::new(x as i32, y as i32);
                let tile = grid.tile_at(coord);
                println!(
                    "  [{idx:>8}] offset=({x:.1}, {y:.1}, {z:.1}) tile={}",
                    tile.map_or_else(
                        || "<missing>".to_string(),
                        |t| format!("{}#{}", t.tile_type, t.variant)
                    )
                );
            }
        }
        Commands::Frames {
            grid_size,
            count,
            roll_step,
        } => {
            let config = with_grid_size(config, grid_size);
            let mut ctx = RecordingContext::new();
            let resources = TilemapResources {
                program: ctx.register_program("tilemap"),
                mesh: ctx.register_mesh("cube"),
                atlas: ctx.register_texture("grass_tileset"),
            };
            let grid =
                TileGrid::with_default_tiles(config.grid_size, &config.tile_type, config.variant)?;
            let mut tilemap = Tilemap::from_grid(&mut ctx, resources, config.tile_size, grid)?;

            let half_extent = (config.grid_size / 2) as f32 * config.tile_size as f32;
            let camera = FlyCamera::framing(half_extent);

            println!("--- setup ---");
            print!("{}", ctx.summary());

            for frame in 0..count {
                ctx.clear_commands();
                tilemap.render(&mut ctx, &camera)?;
                println!("--- frame {frame} ---");
                print!("{}", ctx.summary());
                tilemap.transform_mut().roll_degrees += roll_step;
            }
        }
    }

    Ok(())
}
