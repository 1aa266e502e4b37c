//! Synthetic grids in both native layouts
//!
//! Used by the `synth_grids` binary and by tests. Both writers cover the
//! globe at the same whole-degree step, so their decimated sequences pair up.

use std::io::{self, Write};

fn latitudes(step_deg: u32) -> impl Iterator<Item = f64> {
    (0..=180 / step_deg).map(move |i| 90.0 - f64::from(i * step_deg))
}

/// Check that a whole-degree step tiles both 180° and 360°
pub fn is_valid_step(step_deg: u32) -> bool {
    step_deg > 0 && 180 % step_deg == 0
}

/// Write an elevation grid: one row per latitude, −180°…180° inclusive
///
/// `f(lat, lon)` returns the elevation in kilometers.
pub fn write_elevation_grid<W: Write>(
    w: &mut W,
    step_deg: u32,
    f: impl Fn(f64, f64) -> f64,
) -> io::Result<()> {
    let columns = 360 / step_deg;
    for lat in latitudes(step_deg) {
        let row: Vec<String> = (0..=columns)
            .map(|j| {
                let lon = -180.0 + f64::from(j * step_deg);
                f(lat, lon).to_string()
            })
            .collect();
        writeln!(w, "{}", row.join(" "))?;
    }
    Ok(())
}

/// Write an undulation grid: one `lat lon undulation` row per sample,
/// bands from north to south, longitudes 0°…(360° − step)
///
/// `f(lat, lon)` returns the undulation in meters.
pub fn write_undulation_grid<W: Write>(
    w: &mut W,
    step_deg: u32,
    f: impl Fn(f64, f64) -> f64,
) -> io::Result<()> {
    let columns = 360 / step_deg;
    for lat in latitudes(step_deg) {
        for j in 0..columns {
            let lon = f64::from(j * step_deg);
            writeln!(w, "{} {} {}", lat, lon, f(lat, lon))?;
        }
    }
    Ok(())
}

/// Smooth continents-and-oceans field, in kilometers
pub fn demo_elevation_km(lat: f64, lon: f64) -> f64 {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    4.0 * (2.0 * lat).cos() * (3.0 * lon).sin() - 1.5
}

/// Smooth geoid-like field, in meters
pub fn demo_undulation_m(lat: f64, lon: f64) -> f64 {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    60.0 * lat.sin() * lat.cos() * (2.0 * lon).cos() - 20.0 * (3.0 * lat).sin()
}
