//! Overlay compositing.

use crate::canvas::RgbCanvas;

/// Blend `overlay` onto `basemap`, per pixel and channel:
///
/// `out = (1 - o) * b + o`, clamped to [0, 1].
///
/// The overlay color doubles as its own blend weight, so strong overlay
/// channels dominate the basemap. Both canvases must have the same shape.
///
/// # Example
/// ```
/// use track_heatmap::{composite, RgbCanvas};
///
/// let basemap = RgbCanvas::from_vec(1, 1, vec![0.5, 0.5, 0.5]);
/// let overlay = RgbCanvas::from_vec(1, 1, vec![0.0, 0.5, 1.0]);
/// let out = composite(&basemap, &overlay);
/// assert_eq!(out.pixel(0, 0), [0.5, 0.75, 1.0]);
/// ```
pub fn composite(basemap: &RgbCanvas, overlay: &RgbCanvas) -> RgbCanvas {
    assert!(
        basemap.same_shape(overlay),
        "basemap {}x{} and overlay {}x{} differ",
        basemap.width(),
        basemap.height(),
        overlay.width(),
        overlay.height()
    );

    let data = basemap
        .as_slice()
        .iter()
        .zip(overlay.as_slice())
        .map(|(&b, &o)| ((1.0 - o) * b + o).clamp(0.0, 1.0))
        .collect();
    RgbCanvas::from_vec(basemap.width(), basemap.height(), data)
}
