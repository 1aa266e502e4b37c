//! Angular step arithmetic (all steps in arc-minutes)

use crate::error::{ExportError, GridKind, Result};

/// Arc-minutes in a full longitude sweep
pub const MINUTES_PER_TURN: f64 = 360.0 * 60.0;

/// Arc-minutes from pole to pole
pub const MINUTES_POLE_TO_POLE: f64 = 180.0 * 60.0;

/// Relative tolerance when checking that a ratio of steps is a whole number
const WHOLE_TOLERANCE: f64 = 1e-6;

/// Native step of an elevation grid whose rows hold `n_fields` values
///
/// Rows cover −180°…180° inclusive, so `n − 1` intervals span 360°.
pub fn elevation_native_step(n_fields: usize) -> f64 {
    60.0 / ((n_fields as f64 - 1.0) / 360.0)
}

/// Native step of an undulation grid from the longitudes of its first two rows
pub fn undulation_native_step(first_lon: f64, second_lon: f64) -> f64 {
    round_to((second_lon - first_lon).abs() * 60.0, 2)
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// `value` as an exact positive integer, if it is one
pub fn as_whole(value: f64) -> Option<usize> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round();
    if rounded < 1.0 || (value - rounded).abs() > WHOLE_TOLERANCE * rounded.max(1.0) {
        return None;
    }
    Some(rounded as usize)
}

/// Sample stride that turns `native` into `target`
///
/// No interpolation is done, so the target must be a whole multiple of the
/// native step (a ratio below 1 is rejected as well).
pub fn stride(target: u32, native: f64, grid: GridKind) -> Result<usize> {
    as_whole(f64::from(target) / native).ok_or(ExportError::ResolutionMismatch {
        grid,
        native,
        target,
    })
}

/// Number of latitude bands kept for a target step, both poles included
pub fn retained_bands(target: u32) -> usize {
    (MINUTES_POLE_TO_POLE / f64::from(target)).floor() as usize + 1
}
