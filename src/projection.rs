//! # Tile Projection
//!
//! Web Mercator projection of geographic coordinates onto the slippy-map tile grid.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`tile_position`] | Continuous tile-space position of a point |
//! | [`tile_index`] | Integer tile covering a point |
//! | [`tile_fraction`] | Fractional position of a point inside its tile |
//! | [`is_projectable`] | Whether a point lands on the tile grid at a zoom |
//! | [`tile_bounds`] | Geographic rectangle covered by a tile |
//!
//! ## Algorithm Notes
//!
//! With `n = 2^zoom`, a point maps to
//!
//! ```text
//! x = (lon + 180) / 360 · n
//! y = (1 − asinh(tan(lat)) / π) / 2 · n
//! ```
//!
//! The integer part of `(x, y)` is the tile index and the remainder is the
//! position inside that tile. Both are taken from the same continuous value,
//! so recombining them gives back exactly `(x, y)`.
//!
//! Reference: [Slippy map tilenames (OSM wiki)](https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames)

use std::f64::consts::PI;

use geo::{coord, Rect};

use crate::{GeoPoint, TileIndex};

/// Latitude limit of the square Web Mercator world, in degrees.
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// Number of tiles along one axis at `zoom`.
#[inline]
pub fn tiles_per_axis(zoom: u8) -> f64 {
    (zoom as f64).exp2()
}

/// Continuous tile-space position `(x, y)` of a point.
///
/// Undefined at the poles; callers check [`is_projectable`] first.
///
/// # Example
///
/// ```rust
/// use track_heatmap::{GeoPoint, projection};
///
/// let (x, y) = projection::tile_position(GeoPoint::new(0.0, 0.0), 1);
/// assert!((x - 1.0).abs() < 1e-12);
/// assert!((y - 1.0).abs() < 1e-12);
/// ```
#[inline]
pub fn tile_position(point: GeoPoint, zoom: u8) -> (f64, f64) {
    let n = tiles_per_axis(zoom);
    let lat_rad = point.latitude.to_radians();
    let x = (point.longitude + 180.0) / 360.0 * n;
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n;
    (x, y)
}

/// Integer tile covering a point.
///
/// # Example
///
/// ```rust
/// use track_heatmap::{GeoPoint, TileIndex, projection};
///
/// // Central London at zoom 13
/// let tile = projection::tile_index(GeoPoint::new(51.5074, -0.1278), 13);
/// assert_eq!(tile, TileIndex::new(13, 4093, 2724));
/// ```
pub fn tile_index(point: GeoPoint, zoom: u8) -> TileIndex {
    debug_assert!(is_projectable(point, zoom), "point off the tile grid: {:?}", point);
    let (x, y) = tile_position(point, zoom);
    TileIndex::new(zoom, x.floor() as u32, y.floor() as u32)
}

/// Fractional position `(fx, fy)` of a point inside its tile, each in `[0, 1)`.
pub fn tile_fraction(point: GeoPoint, zoom: u8) -> (f64, f64) {
    let (x, y) = tile_position(point, zoom);
    (x - x.floor(), y - y.floor())
}

/// Whether the point projects onto the tile grid at `zoom`.
///
/// Rejects non-finite input, the poles, latitudes beyond the Mercator limit
/// and longitudes that fall off the east edge.
pub fn is_projectable(point: GeoPoint, zoom: u8) -> bool {
    if !point.is_valid() {
        return false;
    }
    let n = tiles_per_axis(zoom);
    let (x, y) = tile_position(point, zoom);
    (0.0..n).contains(&x) && (0.0..n).contains(&y)
}

/// Longitude of the west edge of tile column `x`.
fn tile_x_to_longitude(x: f64, zoom: u8) -> f64 {
    x / tiles_per_axis(zoom) * 360.0 - 180.0
}

/// Latitude of the north edge of tile row `y`.
fn tile_y_to_latitude(y: f64, zoom: u8) -> f64 {
    let t = PI * (1.0 - 2.0 * y / tiles_per_axis(zoom));
    t.sinh().atan().to_degrees()
}

/// Geographic rectangle covered by a tile, as lon/lat (`x` = longitude).
///
/// # Example
///
/// ```rust
/// use track_heatmap::{TileIndex, projection};
///
/// let rect = projection::tile_bounds(TileIndex::new(0, 0, 0));
/// assert!((rect.min().x + 180.0).abs() < 1e-9);
/// assert!((rect.max().y - projection::MAX_MERCATOR_LATITUDE).abs() < 1e-9);
/// ```
pub fn tile_bounds(tile: TileIndex) -> Rect<f64> {
    let west = tile_x_to_longitude(tile.x as f64, tile.zoom);
    let east = tile_x_to_longitude(tile.x as f64 + 1.0, tile.zoom);
    let north = tile_y_to_latitude(tile.y as f64, tile.zoom);
    let south = tile_y_to_latitude(tile.y as f64 + 1.0, tile.zoom);
    Rect::new(coord! { x: west, y: south }, coord! { x: east, y: north })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    /// Reference formula in the log(tan + sec) form.
    fn reference_y(lat: f64, zoom: u8) -> f64 {
        let lat_rad = lat.to_radians();
        let n = 2.0_f64.powi(zoom as i32);
        (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n
    }

    #[test]
    fn test_equivalent_to_log_tan_sec_form() {
        for lat in [-80.0, -33.9, 0.0, 12.5, 29.76, 51.5074, 84.0] {
            let (_, y) = tile_position(GeoPoint::new(lat, 10.0), 13);
            assert!(approx_eq(y, reference_y(lat, 13), 1e-6), "lat {}", lat);
        }
    }

    #[test]
    fn test_tile_index_known_values() {
        assert_eq!(tile_index(GeoPoint::new(0.0, 0.0), 0), TileIndex::new(0, 0, 0));
        // Houston, TX at zoom 13
        assert_eq!(
            tile_index(GeoPoint::new(29.7604, -95.3698), 13),
            TileIndex::new(13, 1925, 3386)
        );
    }

    #[test]
    fn test_index_and_fraction_reconstruct_position() {
        let zoom = 13;
        for (lat, lon) in [(29.7604, -95.3698), (-33.8688, 151.2093), (64.1466, -21.9426)] {
            let p = GeoPoint::new(lat, lon);
            let (x, y) = tile_position(p, zoom);
            let tile = tile_index(p, zoom);
            let (fx, fy) = tile_fraction(p, zoom);
            assert!((0.0..1.0).contains(&fx));
            assert!((0.0..1.0).contains(&fy));
            assert_eq!(tile.x as f64 + fx, x);
            assert_eq!(tile.y as f64 + fy, y);
        }
    }

    #[test]
    fn test_moving_east_increases_pixel_position() {
        let zoom = 13;
        let tile_px = 256.0;
        let mut lon = -95.40;
        let mut last = f64::NEG_INFINITY;
        while lon < -95.30 {
            let p = GeoPoint::new(29.76, lon);
            let tile = tile_index(p, zoom);
            let (fx, _) = tile_fraction(p, zoom);
            let px = (tile.x as f64 + fx) * tile_px;
            assert!(px > last, "pixel x did not increase at lon {}", lon);
            last = px;
            lon += 0.0005;
        }
    }

    #[test]
    fn test_is_projectable() {
        assert!(is_projectable(GeoPoint::new(51.5, -0.12), 13));
        assert!(is_projectable(GeoPoint::new(-85.0, -180.0), 13));
        assert!(!is_projectable(GeoPoint::new(90.0, 0.0), 13));
        assert!(!is_projectable(GeoPoint::new(-90.0, 0.0), 13));
        assert!(!is_projectable(GeoPoint::new(86.0, 0.0), 13));
        assert!(!is_projectable(GeoPoint::new(0.0, 180.0), 13));
        assert!(!is_projectable(GeoPoint::new(f64::NAN, 0.0), 13));
    }

    #[test]
    fn test_tile_bounds_contains_projected_point() {
        let p = GeoPoint::new(29.7604, -95.3698);
        let rect = tile_bounds(tile_index(p, 13));
        assert!(rect.min().x <= p.longitude && p.longitude < rect.max().x);
        assert!(rect.min().y < p.latitude && p.latitude <= rect.max().y);
    }

    #[test]
    fn test_adjacent_tiles_share_edges() {
        let a = tile_bounds(TileIndex::new(13, 1926, 3389));
        let b = tile_bounds(TileIndex::new(13, 1927, 3390));
        assert!(approx_eq(a.max().x, b.min().x, 1e-12));
        assert!(approx_eq(a.min().y, b.max().y, 1e-12));
    }
}
