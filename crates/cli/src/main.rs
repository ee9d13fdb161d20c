//! lidartile CLI - buffered DTM production from LIDAR tiles

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use lidartile_algorithms::difference::difference;
use lidartile_core::io::{read_geotiff, write_geotiff_atomic, GeoTiffOptions, LasReader, PointSource};
use lidartile_core::Raster;
use lidartile_tiling::batch::list_point_clouds;
use lidartile_tiling::{
    run_batch_with, InterpolationMethod, Pipeline, PipelineConfig, TileId, TileOutcome, WorkDirs,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "lidartile")]
#[command(author, version, about = "Seamless DTM tiles from LIDAR point clouds", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce the DTM of one tile, using its neighbors as buffer
    Tile {
        /// Tile point cloud, e.g. Semis_2021_0770_6278_LA93_IGN69.laz
        tile: PathBuf,
        /// Directory holding the tile and its neighbors (default: the tile's directory)
        #[arg(short, long)]
        input_dir: Option<PathBuf>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Produce the DTM of every tile in a directory
    Batch {
        /// Directory of .las/.laz tiles
        input_dir: PathBuf,
        /// Maximum number of parallel tiles (overrides cpu_limit)
        #[arg(short, long)]
        jobs: Option<usize>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Height difference model: DSM minus DTM
    Dhm {
        /// Surface model raster
        dsm: PathBuf,
        /// Terrain model raster
        dtm: PathBuf,
        /// Output file
        output: PathBuf,
    },
    /// Show information about a raster or point cloud file
    Info {
        /// Input .tif, .las or .laz file
        input: PathBuf,
    },
    /// Print the effective configuration as YAML
    Config {
        /// Configuration file to merge with the defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Output locations and configuration overrides shared by `tile` and `batch`
#[derive(Args)]
struct RunArgs {
    /// Output directory for the clipped rasters
    #[arg(short, long)]
    output: PathBuf,
    /// Directory for buffered intermediates (default: system temp dir)
    #[arg(long)]
    scratch: Option<PathBuf>,
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Interpolation method: startin-TINlinear, startin-Laplace, CGAL-NN,
    /// IDWquad, PDAL-IDW, PDAL-TIN
    #[arg(short, long)]
    method: Option<InterpolationMethod>,
    /// Output pixel size in map units
    #[arg(short, long)]
    pixel_size: Option<f64>,
    /// Buffer width around each tile in map units
    #[arg(short, long)]
    buffer: Option<f64>,
    /// Fill isolated no-data cells having at least this many valid neighbors
    #[arg(long)]
    patch: Option<usize>,
    /// Write 64-bit float rasters
    #[arg(long)]
    double: bool,
}

impl RunArgs {
    /// Configuration file (or defaults) with the command-line overrides applied
    fn config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(method) = self.method {
            config.interpolation.method = method;
        }
        if let Some(pixel_size) = self.pixel_size {
            config.tile_geometry.pixel_size = pixel_size;
        }
        if let Some(buffer) = self.buffer {
            config.buffer_width = buffer;
        }
        if let Some(min_neighbors) = self.patch {
            config.patch = Some(lidartile_algorithms::patch::PatchParams { min_neighbors });
        }
        if self.double {
            config.io.double_precision = true;
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn dirs(&self, input: PathBuf) -> WorkDirs {
        let scratch = self
            .scratch
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("lidartile"));
        WorkDirs::new(input, scratch, self.output.clone())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set up logging")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn tile_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tiles {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> =
        read_geotiff(path).with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn print_outcome(outcome: &TileOutcome) {
    println!("{} saved to: {}", outcome.tile.stem(), outcome.final_raster.display());
    println!(
        "  {} x {} pixels, {} no-data, {} patched",
        outcome.report.cols, outcome.report.rows, outcome.report.nodata_cells, outcome.report.patched
    );
    println!("  {} points from {} neighbors", outcome.points, outcome.neighbors);
    println!("  Processing time: {:.2?}", outcome.elapsed);
}

fn is_point_cloud(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("las") || e.eq_ignore_ascii_case("laz"))
        .unwrap_or(false)
}

fn raster_info(input: &Path) -> Result<()> {
    let raster = read_raster(input)?;
    let (rows, cols) = raster.shape();
    let bounds = raster.bounds();
    let stats = raster.statistics();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Cell size: {}", raster.cell_size());
    println!("Bounds: {}", bounds);
    if let Some(crs) = raster.crs() {
        println!("CRS: {}", crs);
    }
    if let Some(nodata) = raster.nodata() {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if let Some(min) = stats.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = stats.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("  Mean: {:.4}", mean);
    }
    println!(
        "  Valid cells: {} ({:.1}%)",
        stats.valid_count,
        100.0 * stats.valid_count as f64 / raster.len() as f64
    );
    Ok(())
}

fn cloud_info(input: &Path) -> Result<()> {
    let pb = spinner("Reading point cloud...");
    let all = LasReader::new(Vec::new(), None)
        .read(input)
        .with_context(|| format!("Failed to read point cloud {}", input.display()))?;
    let ground = LasReader::ground()
        .read(input)
        .with_context(|| format!("Failed to read point cloud {}", input.display()))?
        .len();
    pb.finish_and_clear();

    println!("File: {}", input.display());
    println!("Points: {} ({} ground)", all.len(), ground);
    if let Some(bounds) = all.bounds {
        println!("Header bounds: {}", bounds);
    }
    match TileId::parse(input) {
        Ok(tile) => {
            let defaults = PipelineConfig::default().tile_geometry;
            println!("Tile: {} ({}, {})", tile.stem(), tile.coord_x, tile.coord_y);
            println!(
                "Nominal footprint: {}",
                tile.footprint(defaults.tile_coord_scale, defaults.tile_width)
            );
            println!("Neighbors:");
            for (direction, neighbor) in &tile.neighbors() {
                println!("  {:?}: {}", direction, neighbor.file_name());
            }
        }
        Err(e) => println!("Not a grid tile name: {}", e),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Single tile ──────────────────────────────────────────────
        Commands::Tile {
            tile,
            input_dir,
            run,
        } => {
            let config = run.config()?;
            let input = match input_dir {
                Some(dir) => dir,
                None => tile
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")),
            };
            let pipeline = Pipeline::new(config, run.dirs(input)).context("Invalid configuration")?;
            let outcome = pipeline
                .run_tile(&tile)
                .with_context(|| format!("Failed to process tile {}", tile.display()))?;
            print_outcome(&outcome);
        }

        // ── Batch ────────────────────────────────────────────────────
        Commands::Batch {
            input_dir,
            jobs,
            run,
        } => {
            let mut config = run.config()?;
            if jobs.is_some() {
                config.cpu_limit = jobs;
            }
            let start = Instant::now();
            let pipeline =
                Pipeline::new(config, run.dirs(input_dir.clone())).context("Invalid configuration")?;
            let count = list_point_clouds(&input_dir)
                .with_context(|| format!("Failed to list {}", input_dir.display()))?
                .len();
            if count == 0 {
                bail!("No .las or .laz files in {}", input_dir.display());
            }

            let pb = tile_bar(count);
            let report = run_batch_with(&pipeline, |path, _| {
                if let Some(name) = path.file_name() {
                    pb.set_message(name.to_string_lossy().into_owned());
                }
                pb.inc(1);
            })
            .context("Batch failed")?;
            pb.finish_and_clear();

            println!(
                "{} of {} tiles saved to: {}",
                report.succeeded(),
                report.tiles.len(),
                run.output.display()
            );
            println!("  Workers: {}", report.threads);
            println!("  Processing time: {:.2?}", start.elapsed());
            let failed: Vec<_> = report.failed().collect();
            for (path, msg) in &failed {
                warn!("{}: {}", path.display(), msg);
            }
            if !failed.is_empty() {
                bail!("{} tiles failed", failed.len());
            }
        }

        // ── DHM ──────────────────────────────────────────────────────
        Commands::Dhm { dsm, dtm, output } => {
            let dsm_r = read_raster(&dsm)?;
            let dtm_r = read_raster(&dtm)?;
            let start = Instant::now();
            let result = difference(&dsm_r, &dtm_r).context("Failed to compute DHM")?;
            let elapsed = start.elapsed();
            let pb = spinner("Writing output...");
            write_geotiff_atomic(&result, &output, Some(GeoTiffOptions::default()))
                .context("Failed to write output")?;
            pb.finish_and_clear();
            println!("DHM saved to: {}", output.display());
            println!("  Processing time: {:.2?}", elapsed);
        }

        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            if is_point_cloud(&input) {
                cloud_info(&input)?;
            } else {
                raster_info(&input)?;
            }
        }

        Commands::Config { config } => {
            let config = match config {
                Some(path) => PipelineConfig::load(&path)
                    .with_context(|| format!("Failed to load configuration {}", path.display()))?,
                None => PipelineConfig::default(),
            };
            print!("{}", config.to_yaml()?);
        }
    }

    Ok(())
}
