//! Owned f32 rasters in row-major layout shared by the pipeline stages.
//!
//! [`GrayCanvas`] holds one sample per pixel (luminance, density).
//! [`RgbCanvas`] holds three interleaved samples per pixel (basemap, overlay, output).
//! All canvases of one run have the same pixel dimensions, so `(row, col)` addresses
//! the same geographic location in each.

/// Single-channel f32 raster.
#[derive(Clone, Debug, PartialEq)]
pub struct GrayCanvas {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl GrayCanvas {
    /// Construct a zero-initialized canvas of size `width × height`.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Wrap existing row-major samples. Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), width * height, "canvas data length mismatch");
        Self { width, height, data }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn idx(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[self.idx(row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, v: f32) {
        let i = self.idx(row, col);
        self.data[i] = v;
    }

    #[inline]
    pub fn add(&mut self, row: usize, col: usize, v: f32) {
        let i = self.idx(row, col);
        self.data[i] += v;
    }

    pub fn row(&self, row: usize) -> &[f32] {
        let start = row * self.width;
        &self.data[start..start + self.width]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        let start = row * self.width;
        &mut self.data[start..start + self.width]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Minimum and maximum sample, or `None` for an empty canvas.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut iter = self.data.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Apply `f` to every sample in place.
    pub fn map_in_place(&mut self, f: impl Fn(f32) -> f32) {
        for v in &mut self.data {
            *v = f(*v);
        }
    }
}

/// Three-channel f32 raster, channels interleaved as `[r, g, b]` per pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct RgbCanvas {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl RgbCanvas {
    pub const CHANNELS: usize = 3;

    /// Construct a zero-initialized (black) canvas of size `width × height`.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height * Self::CHANNELS],
        }
    }

    /// Replicate a single channel into three identical channels.
    pub fn from_gray(gray: &GrayCanvas) -> Self {
        let data = gray
            .as_slice()
            .iter()
            .flat_map(|&v| [v, v, v])
            .collect();
        Self {
            width: gray.width(),
            height: gray.height(),
            data,
        }
    }

    /// Wrap existing interleaved samples. Panics if the length does not match.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            width * height * Self::CHANNELS,
            "canvas data length mismatch"
        );
        Self { width, height, data }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn pixel(&self, row: usize, col: usize) -> [f32; 3] {
        let i = (row * self.width + col) * Self::CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set_pixel(&mut self, row: usize, col: usize, rgb: [f32; 3]) {
        let i = (row * self.width + col) * Self::CHANNELS;
        self.data[i..i + Self::CHANNELS].copy_from_slice(&rgb);
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Same pixel dimensions as `other`.
    pub fn same_shape(&self, other: &RgbCanvas) -> bool {
        self.width == other.width && self.height == other.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_canvas_indexing() {
        let mut c = GrayCanvas::new(4, 3);
        c.set(2, 1, 0.5);
        c.add(2, 1, 0.25);
        assert_eq!(c.get(2, 1), 0.75);
        assert_eq!(c.row(2), &[0.0, 0.75, 0.0, 0.0]);
        assert_eq!(c.as_slice()[9], 0.75);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(GrayCanvas::new(0, 0).min_max(), None);
        let c = GrayCanvas::from_vec(2, 2, vec![0.3, -1.0, 2.0, 0.0]);
        assert_eq!(c.min_max(), Some((-1.0, 2.0)));
    }

    #[test]
    fn test_rgb_from_gray_replicates() {
        let g = GrayCanvas::from_vec(2, 1, vec![0.2, 0.9]);
        let rgb = RgbCanvas::from_gray(&g);
        assert_eq!(rgb.pixel(0, 0), [0.2, 0.2, 0.2]);
        assert_eq!(rgb.pixel(0, 1), [0.9, 0.9, 0.9]);
    }
}
