//! Output sink: 8-bit conversion and PNG encoding.

use std::path::Path;

use image::{ImageFormat, ImageResult, Rgb, RgbImage};

use crate::canvas::RgbCanvas;

impl RgbCanvas {
    /// Quantize to 8 bits per channel as `round(v * 255)`, clamping out-of-range samples.
    pub fn to_rgb8(&self) -> RgbImage {
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        RgbImage::from_fn(self.width() as u32, self.height() as u32, |x, y| {
            let [r, g, b] = self.pixel(y as usize, x as usize);
            Rgb([to_u8(r), to_u8(g), to_u8(b)])
        })
    }
}

/// Write `canvas` as a PNG, creating the parent directory if needed.
pub fn save_png(canvas: &RgbCanvas, path: &Path) -> ImageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    canvas.to_rgb8().save_with_format(path, ImageFormat::Png)
}
