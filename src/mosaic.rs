//! Basemap mosaic assembly.
//!
//! Stitches the luminance of every tile in the extent into one gray canvas,
//! then turns it into the dimmed, inverted RGB basemap the overlay is drawn on.
//! Color in the source tiles is discarded on purpose: the basemap is a uniform
//! receding gray so that the heatmap colors carry all the hue.

use log::debug;

use crate::canvas::{GrayCanvas, RgbCanvas};
use crate::extent::TileExtent;
use crate::tiles::{TileFetchError, TileFetcher, TileRaster};
use crate::{HeatmapConfig, HeatmapError, TileIndex};

/// Fetch every tile of `extent` and build the dimmed RGB basemap.
///
/// The first tile that cannot be fetched, or arrives with the wrong size,
/// aborts the whole mosaic with [`HeatmapError::TileUnavailable`].
pub fn assemble_mosaic<F>(
    extent: &TileExtent,
    fetcher: &F,
    config: &HeatmapConfig,
) -> Result<RgbCanvas, HeatmapError>
where
    F: TileFetcher + ?Sized,
{
    let (width, height) = extent.pixel_size(config.tile_size);
    let mut gray = GrayCanvas::new(width, height);
    let total = extent.tile_count();

    for (i, tile) in extent.tiles().enumerate() {
        debug!("placing tile {}/{} ({})", i + 1, total, tile);
        let raster = fetch_checked(fetcher, tile, config)?;
        place_tile(&mut gray, extent, tile, &raster, config);
    }

    Ok(finish_basemap(&gray, config.dimming_factor))
}

/// Same as [`assemble_mosaic`], fetching tiles in parallel.
///
/// Each tile owns a disjoint block of the canvas, so rasters are fetched
/// concurrently and placed afterwards without synchronization.
#[cfg(feature = "parallel")]
pub fn assemble_mosaic_parallel<F>(
    extent: &TileExtent,
    fetcher: &F,
    config: &HeatmapConfig,
) -> Result<RgbCanvas, HeatmapError>
where
    F: TileFetcher + Sync + ?Sized,
{
    use rayon::prelude::*;

    let tiles: Vec<TileIndex> = extent.tiles().collect();
    let rasters: Vec<(TileIndex, TileRaster)> = tiles
        .par_iter()
        .map(|&tile| fetch_checked(fetcher, tile, config).map(|r| (tile, r)))
        .collect::<Result<_, _>>()?;

    let (width, height) = extent.pixel_size(config.tile_size);
    let mut gray = GrayCanvas::new(width, height);
    for (tile, raster) in &rasters {
        place_tile(&mut gray, extent, *tile, raster, config);
    }

    Ok(finish_basemap(&gray, config.dimming_factor))
}

/// Fetch one tile and check it has the configured size.
fn fetch_checked<F>(
    fetcher: &F,
    tile: TileIndex,
    config: &HeatmapConfig,
) -> Result<TileRaster, HeatmapError>
where
    F: TileFetcher + ?Sized,
{
    let unavailable = |source| HeatmapError::TileUnavailable { tile, source };

    let raster = fetcher.fetch_tile(tile).map_err(unavailable)?;
    let expected = config.tile_size;
    if raster.width() != expected.width || raster.height() != expected.height {
        return Err(unavailable(TileFetchError::SizeMismatch {
            width: raster.width(),
            height: raster.height(),
            expected_width: expected.width,
            expected_height: expected.height,
        }));
    }
    Ok(raster)
}

/// Copy a tile's luminance into its block of the gray canvas.
fn place_tile(
    gray: &mut GrayCanvas,
    extent: &TileExtent,
    tile: TileIndex,
    raster: &TileRaster,
    config: &HeatmapConfig,
) {
    let (row0, col0) = extent.pixel_origin(tile, config.tile_size);
    let tile_w = config.tile_size.width as usize;
    let luminance = raster.luminance();

    for (r, src) in luminance.chunks_exact(tile_w).enumerate() {
        gray.row_mut(row0 + r)[col0..col0 + tile_w].copy_from_slice(src);
    }
}

/// Replicate to RGB, invert and divide by the dimming factor.
///
/// With input in [0, 1] and a factor ≥ 1 the output stays in [0, 1].
pub fn finish_basemap(gray: &GrayCanvas, dimming_factor: f64) -> RgbCanvas {
    let scale = 1.0 / dimming_factor as f32;
    let mut rgb = RgbCanvas::from_gray(gray);
    for v in rgb.as_mut_slice() {
        *v = (1.0 - *v) * scale;
    }
    rgb
}
