//! # Track Heatmap
//!
//! Renders recorded GPS tracks as a density heatmap over a dimmed slippy-map basemap.
//!
//! This library provides:
//! - Web Mercator tile projection (tile indices and in-tile fractions)
//! - Tile extent resolution with an admission ceiling on the mosaic size
//! - Basemap mosaic assembly from fetched tiles
//! - Track density rasterization, logistic shaping and Gaussian smoothing
//! - Color scale lookup and compositing onto the basemap
//!
//! ## Features
//!
//! - **`parallel`** - Parallel tile placement and smoothing with rayon
//! - **`serde`** - Load [`HeatmapConfig`] from JSON
//! - **`gpx`** - Read track points from GPX files
//! - **`http`** - Download tiles into an on-disk cache
//! - **`cli`** - The `track-heatmap` binary
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use track_heatmap::{render_heatmap, GeoPoint, HeatmapConfig, TileIndex, TileRaster, TileFetchError};
//!
//! let points = vec![
//!     GeoPoint::new(29.7604, -95.3698),
//!     GeoPoint::new(29.7605, -95.3697),
//! ];
//!
//! // Any `Fn(TileIndex) -> Result<TileRaster, TileFetchError>` is a tile fetcher
//! let fetch = |_tile: TileIndex| -> Result<TileRaster, TileFetchError> {
//!     Ok(TileRaster::from_gray8(256, 256, vec![200; 256 * 256]))
//! };
//!
//! let heatmap = render_heatmap(&points, &fetch, &HeatmapConfig::default()).unwrap();
//! assert_eq!(heatmap.extent.tile_count(), 1);
//! assert_eq!(heatmap.image.width(), 256);
//! ```

use std::fmt;

pub mod canvas;
pub mod colormap;
pub mod composite;
pub mod density;
pub mod extent;
pub mod mosaic;
pub mod output;
pub mod pipeline;
pub mod projection;
pub mod shaping;
pub mod tiles;

// GPX track reading
#[cfg(feature = "gpx")]
pub mod gpx;

// HTTP module for tile downloading
#[cfg(feature = "http")]
pub mod http;

pub use canvas::{GrayCanvas, RgbCanvas};
pub use colormap::{colorize, ColorScale};
pub use composite::composite;
pub use density::build_density;
pub use extent::{resolve_extent, ResolvedExtent, TileExtent};
pub use mosaic::assemble_mosaic;
pub use output::save_png;
pub use pipeline::{render_heatmap, Heatmap};
pub use shaping::shape_density;
pub use tiles::{DiskTileCache, TileFetchError, TileFetcher, TileRaster};

#[cfg(feature = "parallel")]
pub use mosaic::assemble_mosaic_parallel;
#[cfg(feature = "parallel")]
pub use pipeline::render_heatmap_parallel;

#[cfg(feature = "gpx")]
pub use self::gpx::{read_gpx_dir, read_gpx_file, GpxError};

#[cfg(feature = "http")]
pub use http::{TileDownloadResult, TileDownloader};

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate in degrees.
///
/// # Example
/// ```
/// use track_heatmap::GeoPoint;
/// let point = GeoPoint::new(29.7604, -95.3698); // Houston
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new geographic point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    ///
    /// The poles themselves are excluded: the Mercator projection is singular there.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude > -90.0
            && self.latitude < 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

impl From<GeoPoint> for geo::Point<f64> {
    fn from(p: GeoPoint) -> Self {
        geo::Point::new(p.longitude, p.latitude)
    }
}

/// A slippy-map tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIndex {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileIndex {
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Tile dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileSize {
    pub width: u32,
    pub height: u32,
}

impl TileSize {
    /// A square tile, e.g. the 256px OSM default.
    pub const fn square(side: u32) -> Self {
        Self { width: side, height: side }
    }
}

impl Default for TileSize {
    fn default() -> Self {
        Self::square(256)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for heatmap rendering.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HeatmapConfig {
    /// Slippy-map zoom level used for every tile in the run.
    /// Default: 13
    pub zoom: u8,

    /// Pixel size of one tile. Default: 256x256 (OSM)
    pub tile_size: TileSize,

    /// Basemap intensity divisor. Higher values make the basemap recede further.
    /// Default: 3.0
    pub dimming_factor: f64,

    /// Logistic steepness applied to raw point counts. Lower values need more
    /// trackpoints to reach a high density. Default: 1/6
    pub logistic_k: f64,

    /// Gaussian kernel standard deviation in pixels. 0 disables smoothing.
    /// Default: 1.5
    pub gaussian_sigma_px: f64,

    /// Color scale for the density overlay. Default: jet
    pub color_scale: ColorScale,

    /// Maximum number of tiles in the mosaic. Default: 300
    pub max_tile_count: u64,

    /// Side of the square block each trackpoint increments. Default: 2
    pub point_footprint_px: u32,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            zoom: 13,
            tile_size: TileSize::default(),
            dimming_factor: 3.0,
            logistic_k: 1.0 / 6.0,
            gaussian_sigma_px: 1.5,
            color_scale: ColorScale::Jet,
            max_tile_count: 300,
            point_footprint_px: 2,
        }
    }
}

/// Highest zoom level served by common tile servers.
pub const MAX_ZOOM: u8 = 22;

impl HeatmapConfig {
    /// Check every option against its documented range.
    pub fn validate(&self) -> Result<(), HeatmapError> {
        if self.zoom > MAX_ZOOM {
            return Err(HeatmapError::InvalidConfig(format!(
                "zoom must be at most {}, got {}",
                MAX_ZOOM, self.zoom
            )));
        }
        if self.tile_size.width == 0 || self.tile_size.height == 0 {
            return Err(HeatmapError::InvalidConfig(
                "tile_size must be at least 1x1".to_string(),
            ));
        }
        if !(self.dimming_factor.is_finite() && self.dimming_factor >= 1.0) {
            return Err(HeatmapError::InvalidConfig(format!(
                "dimming_factor must be >= 1, got {}",
                self.dimming_factor
            )));
        }
        if !(self.logistic_k.is_finite() && self.logistic_k > 0.0) {
            return Err(HeatmapError::InvalidConfig(format!(
                "logistic_k must be > 0, got {}",
                self.logistic_k
            )));
        }
        if !(self.gaussian_sigma_px.is_finite() && self.gaussian_sigma_px >= 0.0) {
            return Err(HeatmapError::InvalidConfig(format!(
                "gaussian_sigma_px must be >= 0, got {}",
                self.gaussian_sigma_px
            )));
        }
        if self.max_tile_count == 0 {
            return Err(HeatmapError::InvalidConfig(
                "max_tile_count must be > 0".to_string(),
            ));
        }
        if self.point_footprint_px == 0 {
            return Err(HeatmapError::InvalidConfig(
                "point_footprint_px must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file. Missing fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json_file(path: &std::path::Path) -> Result<Self, HeatmapError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            HeatmapError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            HeatmapError::InvalidConfig(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that halt a heatmap run. No partial image is produced for any of them.
#[derive(Debug, thiserror::Error)]
pub enum HeatmapError {
    #[error("no track points to render")]
    EmptyTrack,

    #[error("track point {index} ({latitude}, {longitude}) cannot be projected onto the tile grid")]
    InvalidPoint {
        index: usize,
        latitude: f64,
        longitude: f64,
    },

    #[error("area too large, reduce zoom or check track files: tile_count = {tile_count} (max {max_tile_count})")]
    ExtentTooLarge { tile_count: u64, max_tile_count: u64 },

    #[error("tile {tile} unavailable: {source}")]
    TileUnavailable {
        tile: TileIndex,
        #[source]
        source: TileFetchError,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
