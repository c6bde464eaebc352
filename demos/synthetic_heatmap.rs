//! Render a heatmap of synthetic loops over a generated basemap.
//!
//! Run with: cargo run --example synthetic_heatmap

use track_heatmap::{
    render_heatmap, save_png, ColorScale, GeoPoint, HeatmapConfig, TileFetchError, TileIndex,
    TileRaster,
};

/// A light grid pattern standing in for real map tiles.
fn grid_tile(tile: TileIndex) -> Result<TileRaster, TileFetchError> {
    let side = 256;
    let data = (0..side * side)
        .map(|i| {
            let (row, col) = (i / side, i % side);
            if row % 64 == 0 || col % 64 == 0 {
                120
            } else {
                230 - ((tile.x + tile.y) % 2) as u8 * 10
            }
        })
        .collect();
    Ok(TileRaster::from_gray8(side as u32, side as u32, data))
}

/// `laps` passes around an ellipse, one point every few meters.
fn loop_track(center: GeoPoint, radius_deg: f64, laps: usize) -> Vec<GeoPoint> {
    let per_lap = 2000;
    (0..laps * per_lap)
        .map(|i| {
            let t = i as f64 / per_lap as f64 * std::f64::consts::TAU;
            // Each lap drifts a little so the line has some width
            let drift = 1.0 + 0.002 * (i / per_lap) as f64;
            GeoPoint::new(
                center.latitude + radius_deg * drift * t.sin(),
                center.longitude + 1.5 * radius_deg * drift * t.cos(),
            )
        })
        .collect()
}

fn main() {
    // Houston: a busy inner loop and a quieter outer one
    let center = GeoPoint::new(29.7604, -95.3698);
    let mut points = loop_track(center, 0.01, 20);
    points.extend(loop_track(center, 0.025, 3));

    println!("Synthetic heatmap\n");
    println!("Track points: {}", points.len());

    for scale in [ColorScale::Jet, ColorScale::Hot] {
        let config = HeatmapConfig {
            color_scale: scale,
            ..Default::default()
        };

        match render_heatmap(&points, &grid_tile, &config) {
            Ok(heatmap) => {
                let e = heatmap.extent;
                println!(
                    "{}: {} tiles (x {}..={}, y {}..={}), image {}x{}",
                    scale,
                    e.tile_count(),
                    e.x_min,
                    e.x_max,
                    e.y_min,
                    e.y_max,
                    heatmap.image.width(),
                    heatmap.image.height()
                );

                let path = std::env::temp_dir().join(format!("synthetic_heatmap_{}.png", scale));
                match save_png(&heatmap.image, &path) {
                    Ok(()) => println!("   saved to {}", path.display()),
                    Err(e) => println!("   could not save: {}", e),
                }
            }
            Err(e) => println!("{}: {}", scale, e),
        }
    }

    // A zoom that is too deep for this area trips the tile ceiling
    let config = HeatmapConfig {
        zoom: 17,
        ..Default::default()
    };
    println!("\nZoom 17:");
    match render_heatmap(&points, &grid_tile, &config) {
        Ok(_) => println!("   rendered"),
        Err(e) => println!("   {}", e),
    }
}
