//! Track point source: GPX files.
//!
//! Every point of every track segment is collected in document order. Routes
//! and waypoints are ignored. Coordinates are not validated here; that is the
//! job of [`crate::resolve_extent`].

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use log::info;

use crate::GeoPoint;

/// Errors while reading GPX tracks.
#[derive(Debug, thiserror::Error)]
pub enum GpxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GPX parse error: {0}")]
    Parse(String),
}

/// Parse one GPX document.
pub fn parse_gpx<R: Read>(reader: R) -> Result<Vec<GeoPoint>, GpxError> {
    let doc = ::gpx::read(reader).map_err(|e| GpxError::Parse(e.to_string()))?;

    let points = doc
        .tracks
        .iter()
        .flat_map(|track| &track.segments)
        .flat_map(|segment| &segment.points)
        .map(|waypoint| {
            let p = waypoint.point();
            GeoPoint::new(p.y(), p.x())
        })
        .collect();
    Ok(points)
}

/// Read every track point of one GPX file.
pub fn read_gpx_file(path: &Path) -> Result<Vec<GeoPoint>, GpxError> {
    let file = std::fs::File::open(path)?;
    parse_gpx(BufReader::new(file))
        .map_err(|e| match e {
            GpxError::Parse(msg) => GpxError::Parse(format!("{}: {}", path.display(), msg)),
            other => other,
        })
}

/// Read and concatenate every `*.gpx` file in `dir`, in path order.
pub fn read_gpx_dir(dir: &Path) -> Result<Vec<GeoPoint>, GpxError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("gpx"))
        })
        .collect();
    files.sort();

    let mut points = Vec::new();
    for (i, path) in files.iter().enumerate() {
        info!(
            "[GPX] Reading GPX file {}/{} ({})",
            i + 1,
            files.len(),
            path.display()
        );
        points.extend(read_gpx_file(path)?);
    }
    info!("[GPX] {} track points from {} files", points.len(), files.len());
    Ok(points)
}
