//! Elevation grid decimation
//!
//! Each row is one latitude band (north to south) holding every longitude
//! from −180° to 180° inclusive. Rows are reordered to run 0°…360° so they
//! line up with the undulation grid, converted to meters and thinned.

use std::io::{BufRead, Seek};

use tracing::debug;

use super::reader::GridReader;
use super::step::{elevation_native_step, retained_bands, stride};
use crate::cancel::CancelFlag;
use crate::error::{ExportError, GridKind, Result};

/// Elevation samples at the target step, flattened row by row
#[derive(Debug, Clone)]
pub struct DecimatedElevation {
    /// Native step in arc-minutes
    pub native_step: f64,
    /// Rows and columns kept: every `stride`-th
    pub stride: usize,
    /// Samples per kept row
    pub columns: usize,
    /// Elevations in meters
    pub values: Vec<f64>,
}

impl DecimatedElevation {
    pub fn rows(&self) -> usize {
        if self.columns == 0 {
            0
        } else {
            self.values.len() / self.columns
        }
    }
}

/// Detect the native step from the width of the first row, then rewind
///
/// Returns the step and the field count every row must have.
pub fn detect_elevation_step<R: BufRead + Seek>(
    reader: &mut GridReader<R>,
) -> Result<(f64, usize)> {
    let n_fields = reader
        .next_field_count()?
        .ok_or(ExportError::IncompleteGrid {
            grid: GridKind::Elevation,
            what: "rows",
            expected: 1,
            actual: 0,
        })?;
    if n_fields < 2 {
        return Err(ExportError::IrregularGrid {
            grid: GridKind::Elevation,
            line: reader.line(),
            detail: format!("a row needs at least 2 values to span 360°, found {}", n_fields),
        });
    }
    reader.rewind()?;
    Ok((elevation_native_step(n_fields), n_fields))
}

/// Index where the 0°…180° half starts in a −180°…180° row
pub fn split_index(native_step: f64) -> usize {
    let half = 360.0 * (60.0 / native_step) / 2.0;
    // 60 / 1800 * 360 lands a hair under 12
    (half + 1e-9).floor() as usize
}

/// Reorder a −180°…180° row into 0°…360°
///
/// The last native value is dropped: it repeats the first longitude
/// (−180° == 180°). Paired undulation grids generated alongside these rows
/// rely on the same width, so the drop is kept as is.
pub fn reorder_row(values: &[f64], mid: usize) -> Vec<f64> {
    let end = values.len().saturating_sub(1);
    let mid = mid.min(end);
    let mut merged = Vec::with_capacity(end);
    merged.extend_from_slice(&values[mid..end]);
    merged.extend_from_slice(&values[..mid]);
    merged
}

/// Decimate an elevation grid to `target_step` arc-minutes
///
/// `scale` converts the native unit to meters (1000 for kilometers).
/// `cancel` is checked before every kept row.
pub fn decimate_elevation<R: BufRead + Seek>(
    reader: &mut GridReader<R>,
    target_step: u32,
    scale: f64,
    cancel: &CancelFlag,
) -> Result<DecimatedElevation> {
    let (native_step, n_fields) = detect_elevation_step(reader)?;
    let stride = stride(target_step, native_step, GridKind::Elevation)?;
    let mid = split_index(native_step);
    let expected_rows = retained_bands(target_step);

    debug!(
        "elevation grid: {} fields/row, native step {}', stride {}, split at {}",
        n_fields, native_step, stride, mid
    );

    let mut values = Vec::new();
    let mut columns = 0;
    let mut rows = 0;

    loop {
        cancel.check()?;
        let Some(row) = reader.next_row()? else {
            break;
        };
        if row.len() != n_fields {
            return Err(ExportError::IrregularGrid {
                grid: GridKind::Elevation,
                line: reader.line(),
                detail: format!("expected {} values, found {}", n_fields, row.len()),
            });
        }

        let merged = reorder_row(&row, mid);
        let before = values.len();
        values.extend(merged.iter().step_by(stride).map(|v| v * scale));
        columns = values.len() - before;
        rows += 1;

        // Rows between kept rows are skipped whole
        reader.skip_rows(stride - 1)?;
    }

    if rows < expected_rows {
        return Err(ExportError::IncompleteGrid {
            grid: GridKind::Elevation,
            what: "rows",
            expected: expected_rows,
            actual: rows,
        });
    }

    debug!("elevation grid: kept {} rows × {} columns", rows, columns);

    Ok(DecimatedElevation {
        native_step,
        stride,
        columns,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::synthetic::write_elevation_grid;
    use std::io::Cursor;

    fn grid_reader(text: Vec<u8>) -> GridReader<Cursor<Vec<u8>>> {
        GridReader::new(Cursor::new(text), GridKind::Elevation)
    }

    fn synthetic(step_deg: u32, f: impl Fn(f64, f64) -> f64) -> GridReader<Cursor<Vec<u8>>> {
        let mut buf = Vec::new();
        write_elevation_grid(&mut buf, step_deg, f).unwrap();
        grid_reader(buf)
    }

    #[test]
    fn test_detect_step_and_rewind() {
        let mut r = synthetic(2, |_, _| 0.0);
        let (step, n) = detect_elevation_step(&mut r).unwrap();
        assert_eq!(n, 181);
        assert_eq!(step, 120.0);
        // Cursor is back at the first row
        assert_eq!(r.next_row().unwrap().unwrap().len(), 181);
        assert_eq!(r.line(), 1);
    }

    #[test]
    fn test_detect_empty_grid() {
        let mut r = grid_reader(Vec::new());
        assert!(matches!(
            detect_elevation_step(&mut r),
            Err(ExportError::IncompleteGrid { .. })
        ));
    }

    #[test]
    fn test_split_index() {
        assert_eq!(split_index(2.0), 5400);
        assert_eq!(split_index(120.0), 90);
        assert_eq!(split_index(1.0), 10800);
        assert_eq!(split_index(1800.0), 6);
    }

    #[test]
    fn test_reorder_row_drops_wraparound() {
        // Longitudes −180, −90, 0, 90, 180
        let row = [-180.0, -90.0, 0.0, 90.0, 180.0];
        let merged = reorder_row(&row, 2);
        assert_eq!(merged, vec![0.0, 90.0, -180.0, -90.0]);
    }

    #[test]
    fn test_reorder_row_complementary_split_restores_order() {
        let row: Vec<f64> = (0..9).map(f64::from).collect();
        let mid = 4;
        let merged = reorder_row(&row, mid);
        assert_eq!(merged.len(), row.len() - 1);

        // Rotating back by the length of the first segment restores the
        // native order, minus the dropped trailing value
        let first_len = row.len() - 1 - mid;
        let mut restored = merged[first_len..].to_vec();
        restored.extend_from_slice(&merged[..first_len]);
        assert_eq!(restored, row[..row.len() - 1].to_vec());
    }

    #[test]
    fn test_decimate_reorders_scales_and_thins() {
        // Value encodes longitude so the reordering is visible
        let mut r = synthetic(30, |_, lon| lon / 1000.0);
        let out = decimate_elevation(&mut r, 3600, 1000.0, &CancelFlag::new()).unwrap();

        assert!((out.native_step - 1800.0).abs() < 1e-9);
        assert_eq!(out.stride, 2);
        // 7 native rows (90..-90 by 30) → rows 0, 2, 4, 6
        assert_eq!(out.rows(), 4);
        // 12 reordered columns (0..330 by 30) → every other one
        assert_eq!(out.columns, 6);
        let first_row: Vec<f64> = out.values[..6].iter().map(|v| v.round()).collect();
        assert_eq!(first_row, vec![0.0, 60.0, 120.0, -180.0, -120.0, -60.0]);
    }

    #[test]
    fn test_decimate_skips_rows_between_kept_rows() {
        let mut r = synthetic(30, |lat, _| lat / 1000.0);
        let out = decimate_elevation(&mut r, 3600, 1000.0, &CancelFlag::new()).unwrap();
        let row_lats: Vec<f64> = out
            .values
            .chunks(out.columns)
            .map(|row| row[0].round())
            .collect();
        assert_eq!(row_lats, vec![90.0, 30.0, -30.0, -90.0]);
    }

    #[test]
    fn test_decimate_rejects_mismatched_step() {
        let mut r = synthetic(30, |_, _| 0.0);
        assert!(matches!(
            decimate_elevation(&mut r, 2000, 1000.0, &CancelFlag::new()),
            Err(ExportError::ResolutionMismatch {
                grid: GridKind::Elevation,
                ..
            })
        ));
    }

    #[test]
    fn test_decimate_rejects_ragged_row() {
        let text = "1 2 3 4 5\n1 2 3\n".as_bytes().to_vec();
        let mut r = grid_reader(text);
        match decimate_elevation(&mut r, 5400, 1.0, &CancelFlag::new()) {
            Err(ExportError::IrregularGrid { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected irregular grid, got {:?}", other),
        }
    }

    #[test]
    fn test_decimate_truncated_grid() {
        let mut buf = Vec::new();
        write_elevation_grid(&mut buf, 30, |_, _| 0.0).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let truncated: String = text.lines().take(3).map(|l| format!("{}\n", l)).collect();
        let mut r = grid_reader(truncated.into_bytes());
        match decimate_elevation(&mut r, 1800, 1000.0, &CancelFlag::new()) {
            Err(ExportError::IncompleteGrid {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 7);
                assert_eq!(actual, 3);
            }
            other => panic!("expected incomplete grid, got {:?}", other),
        }
    }

    #[test]
    fn test_decimate_stops_when_cancelled() {
        let mut buf = Vec::new();
        write_elevation_grid(&mut buf, 30, |_, _| 0.0).unwrap();
        buf.extend_from_slice(b"0 x\n");
        let mut r = grid_reader(buf);
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(matches!(
            decimate_elevation(&mut r, 3600, 1000.0, &cancel),
            Err(ExportError::Interrupted)
        ));
        // Only the step detection row was read
        assert!(r.line() <= 1);
    }
}
