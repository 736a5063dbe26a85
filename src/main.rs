use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use waytiles::{
    AssignStrategy, BoundaryPolicy, BuildOptions, GenerationWindow, GridConfig, OfflineBuilder,
    SpeedOverrides, TileFile, TileLookup, TileStore,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Builds and queries offline road tiles from OpenStreetMap data",
    long_about = None,
    propagate_version = true,
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild the tile set from an .osm.pbf file
    Generate(GenerateArgs),
    /// Print the tile covering a coordinate
    Query(QueryArgs),
    /// Print the contents of a tile file
    Inspect(InspectArgs),
}

/// Grid layout flags shared by writing and reading tiles.
#[derive(Args, Debug)]
struct LayoutArgs {
    /// Cells per degree; a cell is 1/N degrees wide
    #[arg(long, default_value_t = 4)]
    cells_per_degree: u32,

    /// Size in degrees of the directories grouping tile files
    #[arg(long, default_value_t = 2)]
    group_degrees: u32,

    /// Treat points on grid lines as belonging to no cell
    #[arg(long)]
    strict_boundaries: bool,
}

impl LayoutArgs {
    fn config(&self) -> GridConfig {
        GridConfig {
            cells_per_degree: self.cells_per_degree,
            group_degrees: self.group_degrees,
            boundary_policy: if self.strict_boundaries {
                BoundaryPolicy::Strict
            } else {
                BoundaryPolicy::HalfOpen
            },
            ..GridConfig::default()
        }
    }
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Input map file
    #[arg(long, default_value = "map.osm.pbf")]
    input: PathBuf,

    /// Root directory of the tile tree
    #[arg(long, default_value = "offline")]
    output: PathBuf,

    /// JSON object mapping way ids to practical speeds in km/h [default: bundled table]
    #[arg(long, conflicts_with = "no_speed_overrides")]
    speed_overrides: Option<PathBuf>,

    /// Build without any practical speed overrides
    #[arg(long)]
    no_speed_overrides: bool,

    #[arg(long, default_value_t = -90, allow_negative_numbers = true)]
    min_lat: i32,
    #[arg(long, default_value_t = -180, allow_negative_numbers = true)]
    min_lon: i32,
    #[arg(long, default_value_t = 90, allow_negative_numbers = true)]
    max_lat: i32,
    #[arg(long, default_value_t = 180, allow_negative_numbers = true)]
    max_lon: i32,

    /// Also write tiles for cells without any way
    #[arg(long)]
    generate_empty_files: bool,

    /// Test every way against every cell instead of using an R-tree
    #[arg(long)]
    linear_scan: bool,

    /// Worker threads for writing tiles
    #[arg(long)]
    threads: Option<usize>,

    /// Margin in degrees used to duplicate ways into neighbouring tiles
    #[arg(long, default_value_t = 0.01)]
    overlap: f64,

    #[command(flatten)]
    layout: LayoutArgs,
}

impl GenerateArgs {
    fn config(&self) -> GridConfig {
        GridConfig {
            overlap_degrees: self.overlap,
            ..self.layout.config()
        }
    }

    fn overrides(&self) -> Result<SpeedOverrides> {
        if self.no_speed_overrides {
            return Ok(SpeedOverrides::default());
        }
        match &self.speed_overrides {
            Some(path) => SpeedOverrides::from_path(path),
            None => SpeedOverrides::bundled(),
        }
    }
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Root directory of the tile tree
    #[arg(long, default_value = "offline")]
    output: PathBuf,

    #[arg(allow_negative_numbers = true)]
    lat: f64,
    #[arg(allow_negative_numbers = true)]
    lon: f64,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Tile file to decode
    path: PathBuf,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .parse_default_env()
        .init();

    run(Cli::parse())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Generate(args) => generate(args),
        Commands::Query(args) => query(args),
        Commands::Inspect(args) => inspect(args),
    }
}

fn generate(args: GenerateArgs) -> Result<()> {
    info!("Generating offline map");

    let overrides = args.overrides()?;
    info!("Loaded {} speed overrides", overrides.len());

    let options = BuildOptions {
        window: Some(GenerationWindow::new(
            args.min_lat,
            args.min_lon,
            args.max_lat,
            args.max_lon,
        )),
        generate_empty_files: args.generate_empty_files,
        assign_strategy: if args.linear_scan {
            AssignStrategy::Linear
        } else {
            AssignStrategy::RTree
        },
        threads: args.threads,
    };

    let report = OfflineBuilder::new(args.config(), options)?.build_from_pbf(
        &args.input,
        &args.output,
        &overrides,
    )?;

    info!("Done generating offline map: {:?}", report);
    Ok(())
}

fn query(args: QueryArgs) -> Result<()> {
    let store = TileStore::new(&args.output, &args.layout.config())?;

    match store.find_tile_for_point(args.lat, args.lon)? {
        TileLookup::Tile { bytes, .. } => {
            let tile = TileFile::decode(&bytes).context("tile file is corrupt")?;
            print_tile(&tile);
        }
        TileLookup::OutsideGrid => {
            println!("({}, {}) lies in no grid cell", args.lat, args.lon);
        }
        TileLookup::NotGenerated { cell, path } => {
            println!("No tile generated for {} (expected at {:?})", cell, path);
        }
    }
    Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
    let bytes =
        std::fs::read(&args.path).with_context(|| format!("could not read {:?}", args.path))?;
    let tile = TileFile::decode(&bytes).with_context(|| format!("could not decode {:?}", args.path))?;
    print_tile(&tile);
    Ok(())
}

fn print_tile(tile: &TileFile) {
    println!("bounds:  {}", tile.bounds);
    println!("overlap: {}", tile.overlap);
    println!("ways:    {}", tile.ways.len());
    for way in &tile.ways {
        println!(
            "  {:>12} {:<30} ref={:<8} lanes={} oneway={} points={} length={:.0}m",
            way.id,
            way.name,
            way.reference,
            way.lanes,
            way.one_way,
            way.coordinates.len(),
            way.length()
        );
    }
}
