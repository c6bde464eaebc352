//! Color scales and density colorization.

use std::fmt;
use std::str::FromStr;

use crate::canvas::{GrayCanvas, RgbCanvas};

/// Available color scales for the density overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ColorScale {
    /// Dark blue -> Cyan -> Yellow -> Dark red
    #[default]
    Jet,
    /// Purple -> Blue -> Green -> Yellow
    Viridis,
    /// Blue -> Cyan -> Green -> Yellow -> Orange -> Red
    Turbo,
    /// Black -> Red -> Yellow -> White
    Hot,
    /// Black -> White
    Gray,
}

impl ColorScale {
    pub const ALL: [ColorScale; 5] = [
        ColorScale::Jet,
        ColorScale::Viridis,
        ColorScale::Turbo,
        ColorScale::Hot,
        ColorScale::Gray,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ColorScale::Jet => "jet",
            ColorScale::Viridis => "viridis",
            ColorScale::Turbo => "turbo",
            ColorScale::Hot => "hot",
            ColorScale::Gray => "gray",
        }
    }

    /// Map a value in [0, 1] to RGB in [0, 1]. Out-of-range input is clamped.
    pub fn map(&self, value: f32) -> [f32; 3] {
        let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        match self {
            ColorScale::Jet => segmented(&JET, v),
            ColorScale::Hot => segmented(&HOT, v),
            ColorScale::Viridis => interpolate(&VIRIDIS, v),
            ColorScale::Turbo => interpolate(&TURBO, v),
            ColorScale::Gray => [v, v, v],
        }
    }
}

impl fmt::Display for ColorScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown color scale '{0}' (expected jet, viridis, turbo, hot or gray)")]
pub struct UnknownColorScale(pub String);

impl FromStr for ColorScale {
    type Err = UnknownColorScale;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        ColorScale::ALL
            .into_iter()
            .find(|c| c.name() == lower)
            .ok_or_else(|| UnknownColorScale(s.to_string()))
    }
}

/// Piecewise-linear channel anchors `(x, value)`, x ascending from 0 to 1.
type Segments = [&'static [(f32, f32)]; 3];

// matplotlib "jet" segment data
const JET: Segments = [
    &[(0.0, 0.0), (0.35, 0.0), (0.66, 1.0), (0.89, 1.0), (1.0, 0.5)],
    &[(0.0, 0.0), (0.125, 0.0), (0.375, 1.0), (0.64, 1.0), (0.91, 0.0), (1.0, 0.0)],
    &[(0.0, 0.5), (0.11, 1.0), (0.34, 1.0), (0.65, 0.0), (1.0, 0.0)],
];

// matplotlib "hot" segment data
const HOT: Segments = [
    &[(0.0, 0.0416), (0.365079, 1.0), (1.0, 1.0)],
    &[(0.0, 0.0), (0.365079, 0.0), (0.746032, 1.0), (1.0, 1.0)],
    &[(0.0, 0.0), (0.746032, 0.0), (1.0, 1.0)],
];

// Evenly spaced viridis control points
const VIRIDIS: [[f32; 3]; 5] = [
    [0.267004, 0.004874, 0.329415], // Dark purple
    [0.282623, 0.140926, 0.457517], // Purple-blue
    [0.163625, 0.471133, 0.558148], // Blue-green
    [0.477504, 0.821444, 0.318195], // Yellow-green
    [0.993248, 0.906157, 0.143936], // Yellow
];

// Evenly spaced turbo control points
const TURBO: [[f32; 3]; 6] = [
    [0.18995, 0.07176, 0.23217], // Dark blue
    [0.11770, 0.56700, 0.75088], // Cyan
    [0.17205, 0.88797, 0.54362], // Green
    [0.89567, 0.99343, 0.29685], // Yellow
    [0.97809, 0.55414, 0.10540], // Orange
    [0.78801, 0.08080, 0.06051], // Red
];

fn segmented(segments: &Segments, v: f32) -> [f32; 3] {
    segments.map(|anchors| channel(anchors, v))
}

fn channel(anchors: &[(f32, f32)], v: f32) -> f32 {
    for pair in anchors.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if v <= x1 {
            return y0 + (v - x0) / (x1 - x0) * (y1 - y0);
        }
    }
    anchors.last().map_or(0.0, |&(_, y)| y)
}

fn interpolate(points: &[[f32; 3]], v: f32) -> [f32; 3] {
    let idx = v * (points.len() - 1) as f32;
    let i = idx.floor() as usize;
    if i >= points.len() - 1 {
        return points[points.len() - 1];
    }
    let t = idx - i as f32;
    let (p0, p1) = (points[i], points[i + 1]);
    [
        p0[0] + t * (p1[0] - p0[0]),
        p0[1] + t * (p1[1] - p0[1]),
        p0[2] + t * (p1[2] - p0[2]),
    ]
}

/// Map every density sample through `scale`, producing the RGB overlay.
pub fn colorize(density: &GrayCanvas, scale: ColorScale) -> RgbCanvas {
    let data = density
        .as_slice()
        .iter()
        .flat_map(|&d| scale.map(d))
        .collect();
    RgbCanvas::from_vec(density.width(), density.height(), data)
}
