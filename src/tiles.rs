//! Tile rasters and the tile-fetch collaborator.
//!
//! The pipeline asks a [`TileFetcher`] for each tile of the extent and treats any
//! failure as fatal. Caching, retry and rate limiting belong to the fetcher.
//! [`DiskTileCache`] reads tiles previously stored on disk (see the `http`
//! feature for the downloader that fills it).

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::TileIndex;

/// Error returned by a tile fetcher.
#[derive(Debug, thiserror::Error)]
pub enum TileFetchError {
    #[error("tile not found")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("raster is {width}x{height}, expected {expected_width}x{expected_height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
}

/// Sample storage of a tile raster.
#[derive(Debug, Clone, PartialEq)]
pub enum TileSamples {
    /// 8-bit samples, 0..=255 maps to [0, 1]
    U8(Vec<u8>),
    /// Float samples already in [0, 1]
    F32(Vec<f32>),
}

/// A decoded tile: 1 (gray) or 3 (RGB) interleaved channels, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRaster {
    width: u32,
    height: u32,
    channels: u8,
    samples: TileSamples,
}

/// Perceptual luminance weights (ITU-R BT.709) for RGB to gray conversion.
const LUMA_WEIGHTS: [f32; 3] = [0.2125, 0.7154, 0.0721];

impl TileRaster {
    fn with_samples(width: u32, height: u32, channels: u8, samples: TileSamples) -> Self {
        let len = match &samples {
            TileSamples::U8(v) => v.len(),
            TileSamples::F32(v) => v.len(),
        };
        assert_eq!(
            len,
            width as usize * height as usize * channels as usize,
            "tile sample count mismatch"
        );
        Self { width, height, channels, samples }
    }

    pub fn from_gray8(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self::with_samples(width, height, 1, TileSamples::U8(data))
    }

    pub fn from_rgb8(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self::with_samples(width, height, 3, TileSamples::U8(data))
    }

    pub fn from_gray_f32(width: u32, height: u32, data: Vec<f32>) -> Self {
        Self::with_samples(width, height, 1, TileSamples::F32(data))
    }

    pub fn from_rgb_f32(width: u32, height: u32, data: Vec<f32>) -> Self {
        Self::with_samples(width, height, 3, TileSamples::F32(data))
    }

    /// Convert a decoded image. Gray (with or without alpha) stays one channel,
    /// everything else becomes RGB; alpha is dropped.
    pub fn from_image(img: DynamicImage) -> Self {
        let (width, height) = (img.width(), img.height());
        if img.color().has_color() {
            Self::from_rgb8(width, height, img.into_rgb8().into_raw())
        } else {
            Self::from_gray8(width, height, img.into_luma8().into_raw())
        }
    }

    /// Decode an encoded tile (PNG, JPEG, ...).
    pub fn decode(bytes: &[u8]) -> Result<Self, TileFetchError> {
        Ok(Self::from_image(image::load_from_memory(bytes)?))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn samples(&self) -> &TileSamples {
        &self.samples
    }

    /// Luminance of every pixel in [0, 1], row-major.
    pub fn luminance(&self) -> Vec<f32> {
        match &self.samples {
            TileSamples::U8(v) => luma(v, self.channels, |s| s as f32 / 255.0),
            TileSamples::F32(v) => luma(v, self.channels, |s| s),
        }
    }
}

fn luma<T: Copy>(samples: &[T], channels: u8, to_unit: impl Fn(T) -> f32) -> Vec<f32> {
    if channels == 1 {
        return samples.iter().map(|&s| to_unit(s)).collect();
    }
    samples
        .chunks_exact(channels as usize)
        .map(|px| {
            LUMA_WEIGHTS[0] * to_unit(px[0])
                + LUMA_WEIGHTS[1] * to_unit(px[1])
                + LUMA_WEIGHTS[2] * to_unit(px[2])
        })
        .collect()
}

/// Supplies the raster of one tile. Must fail rather than return a partial raster.
pub trait TileFetcher {
    fn fetch_tile(&self, tile: TileIndex) -> Result<TileRaster, TileFetchError>;
}

impl<F> TileFetcher for F
where
    F: Fn(TileIndex) -> Result<TileRaster, TileFetchError>,
{
    fn fetch_tile(&self, tile: TileIndex) -> Result<TileRaster, TileFetchError> {
        self(tile)
    }
}

/// Tiles stored as `tile_{zoom}_{x}_{y}.png` in one directory.
#[derive(Debug, Clone)]
pub struct DiskTileCache {
    dir: PathBuf,
}

impl DiskTileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the cached file for `tile`, whether or not it exists.
    pub fn tile_path(&self, tile: TileIndex) -> PathBuf {
        self.dir
            .join(format!("tile_{}_{}_{}.png", tile.zoom, tile.x, tile.y))
    }

    pub fn contains(&self, tile: TileIndex) -> bool {
        self.tile_path(tile).is_file()
    }
}

impl TileFetcher for DiskTileCache {
    fn fetch_tile(&self, tile: TileIndex) -> Result<TileRaster, TileFetchError> {
        let path = self.tile_path(tile);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TileFetchError::NotFound)
            }
            Err(e) => return Err(e.into()),
        };
        TileRaster::decode(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn approx_eq(a: f32, b: f32, epsilon: f32) -> bool {
        (a - b).abs() < epsilon
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("track-heatmap-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_gray_luminance() {
        let tile = TileRaster::from_gray8(2, 1, vec![0, 255]);
        assert_eq!(tile.luminance(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_rgb_luminance_weights() {
        let tile = TileRaster::from_rgb8(3, 1, vec![255, 0, 0, 0, 255, 0, 255, 255, 255]);
        let l = tile.luminance();
        assert!(approx_eq(l[0], 0.2125, 1e-6));
        assert!(approx_eq(l[1], 0.7154, 1e-6));
        assert!(approx_eq(l[2], 1.0, 1e-6));
    }

    #[test]
    fn test_float_samples() {
        let tile = TileRaster::from_rgb_f32(1, 1, vec![0.5, 0.5, 0.5]);
        assert!(approx_eq(tile.luminance()[0], 0.5, 1e-6));
    }

    #[test]
    fn test_from_image_keeps_channel_count() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([10])));
        assert_eq!(TileRaster::from_image(gray).channels(), 1);

        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])));
        let tile = TileRaster::from_image(rgb);
        assert_eq!(tile.channels(), 3);
        assert_eq!((tile.width(), tile.height()), (4, 4));
    }

    #[test]
    fn test_closure_fetcher() {
        let fetch = |tile: TileIndex| -> Result<TileRaster, TileFetchError> {
            if tile.x == 0 {
                Ok(TileRaster::from_gray8(1, 1, vec![0]))
            } else {
                Err(TileFetchError::NotFound)
            }
        };
        assert!(fetch.fetch_tile(TileIndex::new(1, 0, 0)).is_ok());
        assert!(matches!(
            fetch.fetch_tile(TileIndex::new(1, 1, 0)),
            Err(TileFetchError::NotFound)
        ));
    }

    #[test]
    fn test_disk_cache_roundtrip_and_missing() {
        let dir = temp_dir("cache");
        let cache = DiskTileCache::new(&dir);
        let tile = TileIndex::new(13, 1925, 3386);
        assert!(cache.tile_path(tile).ends_with("tile_13_1925_3386.png"));

        GrayImage::from_pixel(8, 8, Luma([128]))
            .save(cache.tile_path(tile))
            .unwrap();
        assert!(cache.contains(tile));
        let raster = cache.fetch_tile(tile).unwrap();
        assert_eq!((raster.width(), raster.height(), raster.channels()), (8, 8, 1));

        let missing = TileIndex::new(13, 0, 0);
        assert!(matches!(cache.fetch_tile(missing), Err(TileFetchError::NotFound)));

        std::fs::remove_dir_all(dir).ok();
    }
}
