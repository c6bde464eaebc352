//! Tile extent resolution.
//!
//! Projects every track point to its tile, takes the bounding rectangle of
//! those tiles and checks the mosaic size against the configured ceiling.
//! This is the only admission control of a run and happens before any tile
//! is fetched.

use geo::Rect;
use log::debug;

use crate::projection::{is_projectable, tile_bounds, tile_index};
use crate::{GeoPoint, HeatmapConfig, HeatmapError, TileIndex, TileSize};

/// Inclusive rectangle of tiles `[x_min..=x_max] × [y_min..=y_max]` at one zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileExtent {
    pub zoom: u8,
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl TileExtent {
    /// Bounding rectangle of a non-empty set of tiles. Returns `None` when empty.
    pub fn from_tiles(tiles: &[TileIndex]) -> Option<Self> {
        let first = tiles.first()?;
        let mut extent = Self {
            zoom: first.zoom,
            x_min: first.x,
            x_max: first.x,
            y_min: first.y,
            y_max: first.y,
        };
        for t in &tiles[1..] {
            extent.x_min = extent.x_min.min(t.x);
            extent.x_max = extent.x_max.max(t.x);
            extent.y_min = extent.y_min.min(t.y);
            extent.y_max = extent.y_max.max(t.y);
        }
        Some(extent)
    }

    /// Number of tile columns.
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    /// Number of tile rows.
    pub fn height(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    pub fn tile_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn contains(&self, tile: TileIndex) -> bool {
        tile.zoom == self.zoom
            && (self.x_min..=self.x_max).contains(&tile.x)
            && (self.y_min..=self.y_max).contains(&tile.y)
    }

    /// Every tile in the rectangle, x outer and y inner.
    pub fn tiles(&self) -> impl Iterator<Item = TileIndex> + '_ {
        (self.x_min..=self.x_max)
            .flat_map(move |x| (self.y_min..=self.y_max).map(move |y| TileIndex::new(self.zoom, x, y)))
    }

    /// Canvas `(row, col)` of the top-left pixel of `tile`.
    #[inline]
    pub fn pixel_origin(&self, tile: TileIndex, tile_size: TileSize) -> (usize, usize) {
        debug_assert!(self.contains(tile));
        let row = (tile.y - self.y_min) as usize * tile_size.height as usize;
        let col = (tile.x - self.x_min) as usize * tile_size.width as usize;
        (row, col)
    }

    /// Canvas dimensions `(width, height)` in pixels.
    pub fn pixel_size(&self, tile_size: TileSize) -> (usize, usize) {
        (
            self.width() as usize * tile_size.width as usize,
            self.height() as usize * tile_size.height as usize,
        )
    }

    /// Geographic rectangle covered by the extent (lon/lat).
    pub fn geo_bounds(&self) -> Rect<f64> {
        let nw = tile_bounds(TileIndex::new(self.zoom, self.x_min, self.y_min));
        let se = tile_bounds(TileIndex::new(self.zoom, self.x_max, self.y_max));
        Rect::new(
            geo::coord! { x: nw.min().x, y: se.min().y },
            geo::coord! { x: se.max().x, y: nw.max().y },
        )
    }
}

/// Extent of a run plus the tile of every input point, in input order.
#[derive(Debug, Clone)]
pub struct ResolvedExtent {
    pub extent: TileExtent,
    pub tiles: Vec<TileIndex>,
}

/// Resolve and admit the tile extent of a track.
///
/// Fails with [`HeatmapError::EmptyTrack`] for no points,
/// [`HeatmapError::InvalidPoint`] for the first point off the tile grid, and
/// [`HeatmapError::ExtentTooLarge`] when the rectangle holds more than
/// `config.max_tile_count` tiles.
///
/// # Example
/// ```
/// use track_heatmap::{resolve_extent, GeoPoint, HeatmapConfig};
///
/// let points = vec![GeoPoint::new(29.7604, -95.3698), GeoPoint::new(29.7604, -95.3698)];
/// let resolved = resolve_extent(&points, &HeatmapConfig::default()).unwrap();
/// assert_eq!(resolved.extent.tile_count(), 1);
/// assert_eq!(resolved.tiles.len(), 2);
/// ```
pub fn resolve_extent(
    points: &[GeoPoint],
    config: &HeatmapConfig,
) -> Result<ResolvedExtent, HeatmapError> {
    if points.is_empty() {
        return Err(HeatmapError::EmptyTrack);
    }

    let mut tiles = Vec::with_capacity(points.len());
    for (index, p) in points.iter().enumerate() {
        if !is_projectable(*p, config.zoom) {
            return Err(HeatmapError::InvalidPoint {
                index,
                latitude: p.latitude,
                longitude: p.longitude,
            });
        }
        tiles.push(tile_index(*p, config.zoom));
    }

    let extent = TileExtent::from_tiles(&tiles).ok_or(HeatmapError::EmptyTrack)?;
    let tile_count = extent.tile_count();
    debug!(
        "extent x {}..={} y {}..={} at zoom {} ({} tiles)",
        extent.x_min, extent.x_max, extent.y_min, extent.y_max, extent.zoom, tile_count
    );

    if tile_count > config.max_tile_count {
        return Err(HeatmapError::ExtentTooLarge {
            tile_count,
            max_tile_count: config.max_tile_count,
        });
    }

    Ok(ResolvedExtent { extent, tiles })
}
