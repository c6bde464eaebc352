//! End-to-end heatmap rendering.
//!
//! Runs the stages strictly in order, each consuming the complete canvas of
//! the one before:
//!
//! | Stage | Function |
//! |-------|----------|
//! | Extent | [`resolve_extent`] |
//! | Basemap | [`assemble_mosaic`] |
//! | Density | [`build_density`] |
//! | Shaping | [`shape_density`] |
//! | Overlay | [`colorize`] |
//! | Output | [`composite`] |
//!
//! The extent check runs before any tile is fetched. Any error halts the run
//! and no image is returned; writing the result is left to the caller.

use std::time::Instant;

use log::info;

use crate::canvas::{GrayCanvas, RgbCanvas};
use crate::colormap::colorize;
use crate::composite::composite;
use crate::density::build_density;
use crate::extent::{resolve_extent, TileExtent};
use crate::mosaic::assemble_mosaic;
use crate::shaping::shape_density;
use crate::tiles::TileFetcher;
use crate::{GeoPoint, HeatmapConfig, HeatmapError};

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct Heatmap {
    /// Composited RGB image, every channel in [0, 1].
    pub image: RgbCanvas,
    /// Shaped density the overlay was colored from, in [0, 1].
    pub density: GrayCanvas,
    /// Tiles covered by the image.
    pub extent: TileExtent,
}

/// Render `points` as a heatmap over tiles supplied by `fetcher`.
pub fn render_heatmap<F>(
    points: &[GeoPoint],
    fetcher: &F,
    config: &HeatmapConfig,
) -> Result<Heatmap, HeatmapError>
where
    F: TileFetcher + ?Sized,
{
    render_with(points, config, |extent| {
        assemble_mosaic(extent, fetcher, config)
    })
}

/// Same as [`render_heatmap`], fetching tiles and smoothing in parallel.
#[cfg(feature = "parallel")]
pub fn render_heatmap_parallel<F>(
    points: &[GeoPoint],
    fetcher: &F,
    config: &HeatmapConfig,
) -> Result<Heatmap, HeatmapError>
where
    F: TileFetcher + Sync + ?Sized,
{
    render_with(points, config, |extent| {
        crate::mosaic::assemble_mosaic_parallel(extent, fetcher, config)
    })
}

fn render_with<M>(
    points: &[GeoPoint],
    config: &HeatmapConfig,
    mosaic: M,
) -> Result<Heatmap, HeatmapError>
where
    M: FnOnce(&TileExtent) -> Result<RgbCanvas, HeatmapError>,
{
    config.validate()?;
    let start = Instant::now();

    let resolved = resolve_extent(points, config)?;
    let extent = resolved.extent;
    info!(
        "[Heatmap] {} points span {} tiles ({}x{}) at zoom {}",
        points.len(),
        extent.tile_count(),
        extent.width(),
        extent.height(),
        extent.zoom
    );
    let bounds = extent.geo_bounds();
    info!(
        "[Heatmap] Covered area: lon {:.5}..{:.5}, lat {:.5}..{:.5}",
        bounds.min().x,
        bounds.max().x,
        bounds.min().y,
        bounds.max().y
    );

    let stage = Instant::now();
    let basemap = mosaic(&extent)?;
    info!(
        "[Heatmap] Basemap {}x{} assembled in {:?}",
        basemap.width(),
        basemap.height(),
        stage.elapsed()
    );

    let stage = Instant::now();
    let raw = build_density(points, &resolved, config);
    info!("[Heatmap] Density accumulated in {:?}", stage.elapsed());

    let stage = Instant::now();
    let density = shape_density(raw, config);
    info!("[Heatmap] Density shaped in {:?}", stage.elapsed());

    let stage = Instant::now();
    let overlay = colorize(&density, config.color_scale);
    let image = composite(&basemap, &overlay);
    info!(
        "[Heatmap] Colorized ({}) and composited in {:?}",
        config.color_scale,
        stage.elapsed()
    );

    info!("[Heatmap] Rendered in {:?}", start.elapsed());
    Ok(Heatmap { image, density, extent })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{tile_bounds, tile_fraction};
    use crate::tiles::{TileFetchError, TileRaster};
    use crate::{ColorScale, TileIndex};
    use std::cell::Cell;

    const HOUSTON: GeoPoint = GeoPoint { latitude: 29.7604, longitude: -95.3698 };

    fn flat_tile(_tile: TileIndex) -> Result<TileRaster, TileFetchError> {
        Ok(TileRaster::from_gray8(256, 256, vec![200; 256 * 256]))
    }

    fn point_in_tile(x: u32, y: u32) -> GeoPoint {
        let c = tile_bounds(TileIndex::new(13, x, y)).center();
        GeoPoint::new(c.y, c.x)
    }

    #[test]
    fn test_identical_points_single_tile() {
        let config = HeatmapConfig::default();
        let heatmap = render_heatmap(&[HOUSTON, HOUSTON], &flat_tile, &config).unwrap();

        assert_eq!(heatmap.extent.tile_count(), 1);
        assert_eq!((heatmap.image.width(), heatmap.image.height()), (256, 256));

        // Pixel of the point inside its tile
        let (fx, fy) = tile_fraction(HOUSTON, 13);
        let row = (fy * 256.0).floor() as usize;
        let col = (fx * 256.0).floor() as usize;

        // The only maximum is the 2x2 footprint ending at that pixel
        let density = &heatmap.density;
        let peak: Vec<(usize, usize)> = (0..256)
            .flat_map(|r| (0..256).map(move |c| (r, c)))
            .filter(|&(r, c)| density.get(r, c) == 1.0)
            .collect();
        assert_eq!(peak, vec![(row - 1, col - 1), (row - 1, col), (row, col - 1), (row, col)]);
        assert!(density.get(row, col + 3) < density.get(row, col + 1));
        assert_eq!(density.get(0, 0), 0.0);

        // Jet: the footprint is red, the empty background is blue
        let hot = heatmap.image.pixel(row, col);
        assert!(hot[0] > 0.5 && hot[0] > hot[2]);
        let cold = heatmap.image.pixel(200, 20);
        assert!(cold[2] > cold[0]);

        // Background red channel is the dimmed, inverted basemap
        let dimmed = (1.0 - 200.0 / 255.0) / 3.0;
        assert!((cold[0] - dimmed).abs() < 1e-5);
    }

    #[test]
    fn test_too_many_tiles_fetches_nothing() {
        let calls = Cell::new(0);
        let fetch = |tile: TileIndex| {
            calls.set(calls.get() + 1);
            flat_tile(tile)
        };
        // 7 x 43 = 301 tiles
        let points = vec![point_in_tile(1900, 3380), point_in_tile(1906, 3422)];

        match render_heatmap(&points, &fetch, &HeatmapConfig::default()) {
            Err(HeatmapError::ExtentTooLarge { tile_count, .. }) => assert_eq!(tile_count, 301),
            other => panic!("expected ExtentTooLarge, got {:?}", other.map(|h| h.extent)),
        }
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_missing_tile_halts_run() {
        let fetch = |tile: TileIndex| {
            if (tile.x, tile.y) == (1926, 3386) {
                Err(TileFetchError::NotFound)
            } else {
                flat_tile(tile)
            }
        };
        let points = vec![point_in_tile(1925, 3386), point_in_tile(1927, 3387)];

        match render_heatmap(&points, &fetch, &HeatmapConfig::default()) {
            Err(HeatmapError::TileUnavailable { tile, .. }) => {
                assert_eq!(tile, TileIndex::new(13, 1926, 3386));
            }
            other => panic!("expected TileUnavailable, got {:?}", other.map(|h| h.extent)),
        }
    }

    #[test]
    fn test_invalid_config_rejected_first() {
        let calls = Cell::new(0);
        let fetch = |tile: TileIndex| {
            calls.set(calls.get() + 1);
            flat_tile(tile)
        };
        let config = HeatmapConfig { dimming_factor: 0.0, ..Default::default() };
        let err = render_heatmap(&[HOUSTON], &fetch, &config).unwrap_err();
        assert!(matches!(err, HeatmapError::InvalidConfig(_)));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_output_range_for_every_scale() {
        let points = vec![HOUSTON, point_in_tile(1926, 3386)];
        for color_scale in ColorScale::ALL {
            let config = HeatmapConfig { color_scale, ..Default::default() };
            let heatmap = render_heatmap(&points, &flat_tile, &config).unwrap();
            assert_eq!(heatmap.extent.tile_count(), 2);
            assert!(heatmap
                .image
                .as_slice()
                .iter()
                .all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let points = vec![HOUSTON, point_in_tile(1926, 3387)];
        let config = HeatmapConfig::default();
        let a = render_heatmap(&points, &flat_tile, &config).unwrap();
        let b = render_heatmap_parallel(&points, &flat_tile, &config).unwrap();
        assert_eq!(a.image, b.image);
    }
}
