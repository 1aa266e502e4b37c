//! Undulation grid decimation
//!
//! One `lat lon undulation` triplet per row. Rows come in bands of constant
//! latitude (north to south), longitude ascending from 0° within a band, and
//! every band holds the same number of rows.

use std::io::{BufRead, Seek};

use serde::Serialize;
use tracing::debug;

use super::reader::GridReader;
use super::step::{as_whole, retained_bands, stride, undulation_native_step, MINUTES_PER_TURN};
use crate::cancel::CancelFlag;
use crate::error::{ExportError, GridKind, Result};

/// One geoid sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UndulationSample {
    /// Degrees
    pub lat: f64,
    /// Degrees
    pub lon: f64,
    /// Meters above the ellipsoid
    pub undulation: f64,
}

/// Undulation samples at the target step, band after band
#[derive(Debug, Clone)]
pub struct DecimatedUndulation {
    pub native_step: f64,
    /// Keep every `stride`-th longitude and every `stride`-th band
    pub stride: usize,
    /// Native rows per band
    pub band_height: usize,
    pub bands: usize,
    pub samples: Vec<UndulationSample>,
}

fn parse_sample<R: BufRead + Seek>(
    reader: &GridReader<R>,
    row: &[f64],
) -> Result<UndulationSample> {
    match row {
        [lat, lon, undulation] => Ok(UndulationSample {
            lat: *lat,
            lon: *lon,
            undulation: *undulation,
        }),
        _ => Err(ExportError::Parse {
            grid: GridKind::Undulation,
            line: reader.line(),
            detail: format!("expected 'lat lon undulation', found {} values", row.len()),
        }),
    }
}

fn read_sample<R: BufRead + Seek>(reader: &mut GridReader<R>) -> Result<Option<UndulationSample>> {
    match reader.next_row()? {
        Some(row) => parse_sample(reader, &row).map(Some),
        None => Ok(None),
    }
}

/// Detect the native step from the longitudes of the first two rows, then rewind
pub fn detect_undulation_step<R: BufRead + Seek>(reader: &mut GridReader<R>) -> Result<f64> {
    let mut first_two = Vec::with_capacity(2);
    while first_two.len() < 2 {
        match read_sample(reader)? {
            Some(sample) => first_two.push(sample),
            None => {
                return Err(ExportError::IncompleteGrid {
                    grid: GridKind::Undulation,
                    what: "rows",
                    expected: 2,
                    actual: first_two.len(),
                })
            }
        }
    }

    let step = undulation_native_step(first_two[0].lon, first_two[1].lon);
    if step <= 0.0 {
        return Err(ExportError::IrregularGrid {
            grid: GridKind::Undulation,
            line: reader.line(),
            detail: "first two rows share a longitude".to_string(),
        });
    }

    reader.rewind()?;
    Ok(step)
}

/// Decimate an undulation grid to `target_step` arc-minutes
///
/// `cancel` is checked before every kept band.
pub fn decimate_undulation<R: BufRead + Seek>(
    reader: &mut GridReader<R>,
    target_step: u32,
    cancel: &CancelFlag,
) -> Result<DecimatedUndulation> {
    let native_step = detect_undulation_step(reader)?;
    let stride = stride(target_step, native_step, GridKind::Undulation)?;
    let band_height =
        as_whole(MINUTES_PER_TURN / native_step).ok_or_else(|| ExportError::IrregularGrid {
            grid: GridKind::Undulation,
            line: 2,
            detail: format!("native step {}' does not divide 360°", native_step),
        })?;
    let bands = retained_bands(target_step);

    // The last row of each band is never read (matches the elevation rows,
    // which drop their duplicate 180° column)
    let read_per_band = band_height - 1;
    // After a band, skip what is left of it plus the `stride - 1` bands
    // that are not kept, landing on the first row of the next kept band
    let rest_of_band = stride * band_height - band_height + 1;

    let band_spacing = f64::from(target_step) / 60.0;
    // Half a native cell, in degrees
    let tolerance = native_step / 60.0 / 2.0;

    debug!(
        "undulation grid: native step {}', stride {}, {} rows/band, keeping {} bands",
        native_step, stride, band_height, bands
    );

    let mut samples = Vec::with_capacity(bands * read_per_band.div_ceil(stride));
    let mut previous_lat: Option<f64> = None;
    let mut first_lon: Option<f64> = None;

    for band in 0..bands {
        cancel.check()?;
        let incomplete = ExportError::IncompleteGrid {
            grid: GridKind::Undulation,
            what: "bands",
            expected: bands,
            actual: band,
        };
        let mut band_lat: Option<f64> = None;

        for i in 0..read_per_band {
            if i % stride != 0 {
                if reader.skip_rows(1)? == 0 {
                    return Err(incomplete);
                }
                continue;
            }

            let sample = match read_sample(reader)? {
                Some(sample) => sample,
                None => return Err(incomplete),
            };

            match band_lat {
                None => {
                    if let Some(prev) = previous_lat {
                        let spacing = (prev - sample.lat).abs();
                        if (spacing - band_spacing).abs() > tolerance {
                            return Err(ExportError::IrregularGrid {
                                grid: GridKind::Undulation,
                                line: reader.line(),
                                detail: format!(
                                    "band starts at latitude {} but {} was expected",
                                    sample.lat,
                                    prev - band_spacing
                                ),
                            });
                        }
                    }
                    match first_lon {
                        Some(lon) if (sample.lon - lon).abs() > tolerance => {
                            return Err(ExportError::IrregularGrid {
                                grid: GridKind::Undulation,
                                line: reader.line(),
                                detail: format!(
                                    "band starts at longitude {} instead of {}; bands of uneven height are not supported",
                                    sample.lon, lon
                                ),
                            });
                        }
                        Some(_) => {}
                        None => first_lon = Some(sample.lon),
                    }
                    band_lat = Some(sample.lat);
                }
                Some(lat) if (sample.lat - lat).abs() > tolerance => {
                    return Err(ExportError::IrregularGrid {
                        grid: GridKind::Undulation,
                        line: reader.line(),
                        detail: format!(
                            "latitude {} inside the band at latitude {}; bands of uneven height are not supported",
                            sample.lat, lat
                        ),
                    });
                }
                Some(_) => {}
            }

            samples.push(sample);
        }

        previous_lat = band_lat;

        // Nothing needs to follow the last kept band
        if band + 1 < bands {
            reader.skip_rows(rest_of_band)?;
        }
    }

    debug!("undulation grid: kept {} samples", samples.len());

    Ok(DecimatedUndulation {
        native_step,
        stride,
        band_height,
        bands,
        samples,
    })
}
