//! Raw track density rasterization.
//!
//! Every trackpoint adds 1 to a small square footprint of pixels on a grid
//! aligned with the basemap canvas. Counts are unbounded: repeated passes over
//! the same spot keep accumulating.

use crate::canvas::GrayCanvas;
use crate::extent::ResolvedExtent;
use crate::projection::tile_fraction;
use crate::{GeoPoint, HeatmapConfig};

/// Build the raw density grid for `points`.
///
/// `resolved` must come from [`crate::resolve_extent`] on the same points and
/// config; its per-point tiles are reused instead of projecting twice.
/// Footprints that reach past the canvas edge are clipped.
pub fn build_density(
    points: &[GeoPoint],
    resolved: &ResolvedExtent,
    config: &HeatmapConfig,
) -> GrayCanvas {
    debug_assert_eq!(points.len(), resolved.tiles.len());

    let tile_size = config.tile_size;
    let (width, height) = resolved.extent.pixel_size(tile_size);
    let mut grid = GrayCanvas::new(width, height);

    let footprint = config.point_footprint_px as i64;
    let anchor = footprint / 2;

    for (point, &tile) in points.iter().zip(&resolved.tiles) {
        let (fx, fy) = tile_fraction(*point, config.zoom);
        let (row0, col0) = resolved.extent.pixel_origin(tile, tile_size);

        let gi = row0 as i64 + (fy * tile_size.height as f64).floor() as i64;
        let gj = col0 as i64 + (fx * tile_size.width as f64).floor() as i64;

        let rows = clip_span(gi - anchor, footprint, height);
        let cols = clip_span(gj - anchor, footprint, width);
        for r in rows {
            for v in &mut grid.row_mut(r)[cols.clone()] {
                *v += 1.0;
            }
        }
    }

    grid
}

/// `[start, start + len)` intersected with `[0, limit)`.
fn clip_span(start: i64, len: i64, limit: usize) -> std::ops::Range<usize> {
    let lo = start.clamp(0, limit as i64) as usize;
    let hi = (start + len).clamp(0, limit as i64) as usize;
    lo..hi
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::resolve_extent;
    use crate::projection::{tile_bounds, tile_position};
    use crate::{TileIndex, TileSize};

    fn config() -> HeatmapConfig {
        HeatmapConfig::default()
    }

    /// Point whose pixel inside tile (x, y) at zoom 13 is (row, col) for 256px tiles.
    fn point_at_pixel(x: u32, y: u32, row: u32, col: u32) -> GeoPoint {
        let rect = tile_bounds(TileIndex::new(13, x, y));
        let lon = rect.min().x + (col as f64 + 0.5) / 256.0 * (rect.max().x - rect.min().x);
        // Bisect latitude for the wanted fractional row
        let target = y as f64 + (row as f64 + 0.5) / 256.0;
        let (mut north, mut south) = (rect.max().y, rect.min().y);
        for _ in 0..100 {
            let mid = (north + south) / 2.0;
            if tile_position(GeoPoint::new(mid, lon), 13).1 < target {
                north = mid;
            } else {
                south = mid;
            }
        }
        GeoPoint::new((north + south) / 2.0, lon)
    }

    #[test]
    fn test_point_marks_two_by_two_block() {
        let points = vec![point_at_pixel(1925, 3386, 100, 50)];
        let resolved = resolve_extent(&points, &config()).unwrap();
        let grid = build_density(&points, &resolved, &config());

        assert_eq!((grid.width(), grid.height()), (256, 256));
        for (r, c) in [(99, 49), (99, 50), (100, 49), (100, 50)] {
            assert_eq!(grid.get(r, c), 1.0, "pixel ({}, {})", r, c);
        }
        assert_eq!(grid.as_slice().iter().sum::<f32>(), 4.0);
    }

    #[test]
    fn test_repeated_points_accumulate() {
        let p = point_at_pixel(1925, 3386, 10, 10);
        let points = vec![p, p, p];
        let resolved = resolve_extent(&points, &config()).unwrap();
        let grid = build_density(&points, &resolved, &config());
        assert_eq!(grid.get(10, 10), 3.0);
        assert_eq!(grid.min_max(), Some((0.0, 3.0)));
    }

    #[test]
    fn test_edge_point_is_clipped() {
        let points = vec![point_at_pixel(1925, 3386, 0, 0)];
        let resolved = resolve_extent(&points, &config()).unwrap();
        let grid = build_density(&points, &resolved, &config());
        assert_eq!(grid.get(0, 0), 1.0);
        assert_eq!(grid.as_slice().iter().sum::<f32>(), 1.0);
    }

    #[test]
    fn test_second_tile_offset() {
        let points = vec![
            point_at_pixel(1925, 3386, 5, 5),
            point_at_pixel(1926, 3387, 5, 5),
        ];
        let resolved = resolve_extent(&points, &config()).unwrap();
        let grid = build_density(&points, &resolved, &config());
        assert_eq!((grid.width(), grid.height()), (512, 512));
        assert_eq!(grid.get(256 + 5, 256 + 5), 1.0);
        assert_eq!(grid.get(5, 5), 1.0);
    }

    #[test]
    fn test_configurable_footprint() {
        let cfg = HeatmapConfig { point_footprint_px: 3, ..config() };
        let points = vec![point_at_pixel(1925, 3386, 20, 20)];
        let resolved = resolve_extent(&points, &cfg).unwrap();
        let grid = build_density(&points, &resolved, &cfg);
        assert_eq!(grid.as_slice().iter().sum::<f32>(), 9.0);
        assert_eq!(grid.get(19, 19), 1.0);
        assert_eq!(grid.get(21, 21), 1.0);
        assert_eq!(grid.get(22, 22), 0.0);
    }

    #[test]
    fn test_non_square_tiles() {
        let cfg = HeatmapConfig { tile_size: TileSize { width: 512, height: 256 }, ..config() };
        let points = vec![point_at_pixel(1925, 3386, 100, 50)];
        let resolved = resolve_extent(&points, &cfg).unwrap();
        let grid = build_density(&points, &resolved, &cfg);
        assert_eq!((grid.width(), grid.height()), (512, 256));
        // column 50.5/256 of the tile lands on column ~101 of 512
        assert_eq!(grid.get(100, 100), 1.0);
    }

    #[test]
    fn test_clip_span() {
        assert_eq!(clip_span(-1, 2, 10), 0..1);
        assert_eq!(clip_span(9, 2, 10), 9..10);
        assert_eq!(clip_span(3, 2, 10), 3..5);
        assert_eq!(clip_span(-5, 2, 10), 0..0);
    }
}
