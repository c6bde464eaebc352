//! Render every GPX track in a directory as a heatmap PNG.
//!
//! Tiles are downloaded into a local cache first (unless `--offline`), then
//! the heatmap is rendered from that cache.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueHint};
use log::{info, warn};

use track_heatmap::http::{download_tiles_sync, DEFAULT_TILE_URL};
use track_heatmap::{
    read_gpx_dir, resolve_extent, save_png, ColorScale, DiskTileCache, HeatmapConfig,
};

#[cfg(feature = "parallel")]
use track_heatmap::render_heatmap_parallel as render;
#[cfg(not(feature = "parallel"))]
use track_heatmap::render_heatmap as render;

#[derive(Parser, Debug)]
#[command(author, version, about = "GPS track heatmap over a dimmed map", long_about = None)]
struct Args {
    /// Directory containing the *.gpx track files
    #[arg(long, default_value = "gpx", value_hint = ValueHint::DirPath)]
    gpx_dir: PathBuf,

    /// Output PNG file path
    #[arg(short, long, default_value = "heatmap.png", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Tile cache directory
    #[arg(long, default_value = "tiles", value_hint = ValueHint::DirPath)]
    tiles_dir: PathBuf,

    /// JSON configuration file; missing fields take their defaults
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Zoom level (overrides the configuration file)
    #[arg(long)]
    zoom: Option<u8>,

    /// Color scale: jet, viridis, turbo, hot or gray (overrides the configuration file)
    #[arg(long)]
    colormap: Option<ColorScale>,

    /// Tile server URL template with {z}, {x} and {y}
    #[arg(long, default_value = DEFAULT_TILE_URL)]
    tile_url: String,

    /// Only use tiles already in the cache
    #[arg(long, action = ArgAction::SetTrue)]
    offline: bool,

    /// Verbosity (-v for debug output)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose > 0 { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => HeatmapConfig::from_json_file(path)?,
        None => HeatmapConfig::default(),
    };
    if let Some(zoom) = args.zoom {
        config.zoom = zoom;
    }
    if let Some(scale) = args.colormap {
        config.color_scale = scale;
    }
    config.validate()?;

    let points = read_gpx_dir(&args.gpx_dir)?;
    info!("Read {} track points from {}", points.len(), args.gpx_dir.display());

    // Admission check before anything is downloaded
    let resolved = resolve_extent(&points, &config)?;
    let cache = DiskTileCache::new(&args.tiles_dir);

    if args.offline {
        info!("Offline: using tiles in {} only", cache.dir().display());
    } else {
        let tiles = resolved.extent.tiles().collect();
        let results = download_tiles_sync(cache.clone(), &args.tile_url, tiles, None)?;
        for failed in results.iter().filter(|r| !r.success) {
            warn!(
                "Tile {} not downloaded: {}",
                failed.tile,
                failed.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let heatmap = render(&points, &cache, &config)?;

    save_png(&heatmap.image, &args.output)?;
    info!(
        "Heatmap {}x{} saved to {}",
        heatmap.image.width(),
        heatmap.image.height(),
        args.output.display()
    );
    Ok(())
}
