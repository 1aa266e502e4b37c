//! Paired export pipeline
//!
//! The pipeline:
//! 1. Decimates the undulation and elevation grids (concurrently)
//! 2. Pairs the two sequences, failing if they do not line up
//! 3. Stages one geoid/topography output pair per exaggeration factor
//! 4. Projects every paired sample and writes both vertices, one task per factor
//!
//! Outputs are committed only when every factor finished; any error or a
//! cancellation rolls them back.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info};

use crate::cancel::CancelFlag;
use crate::config::ExportConfig;
use crate::error::{ExportError, GridKind, Result};
use crate::export::{OutputFiles, OutputSet, VertexSink};
use crate::geodesy::Ellipsoid;
use crate::grid::{decimate_elevation, decimate_undulation, GridReader, UndulationSample};
use crate::memprof;

/// Samples written between two cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Undulation and elevation sequences known to be the same length
///
/// Index `i` of both refers to the same latitude row and longitude column.
#[derive(Debug, Clone)]
pub struct PairedGrid {
    undulation: Vec<UndulationSample>,
    elevation: Vec<f64>,
}

impl PairedGrid {
    pub fn new(undulation: Vec<UndulationSample>, elevation: Vec<f64>) -> Result<Self> {
        if undulation.len() != elevation.len() {
            return Err(ExportError::Alignment {
                undulation: undulation.len(),
                elevation: elevation.len(),
            });
        }
        Ok(Self {
            undulation,
            elevation,
        })
    }

    pub fn len(&self) -> usize {
        self.undulation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undulation.is_empty()
    }

    /// `(undulation sample, orthometric height)` pairs in grid order
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&UndulationSample, f64)> + '_ {
        self.undulation.iter().zip(self.elevation.iter().copied())
    }
}

/// Height above the ellipsoid from height above the geoid
pub fn ellipsoidal_height(orthometric: f64, undulation: f64) -> f64 {
    orthometric + undulation
}

/// Project every pair for one exaggeration factor
///
/// The geoid sink gets the undulation surface, the topography sink the
/// ellipsoidal height surface. Returns the number of vertices per sink.
pub fn write_factor<G: VertexSink, T: VertexSink>(
    grid: &PairedGrid,
    ellipsoid: &Ellipsoid,
    factor: u32,
    geoid: &mut G,
    topo: &mut T,
    cancel: &CancelFlag,
) -> Result<usize> {
    for (i, (sample, orthometric)) in grid.iter().enumerate() {
        if i % CANCEL_CHECK_INTERVAL == 0 {
            cancel.check()?;
        }
        let helip = ellipsoidal_height(orthometric, sample.undulation);

        let g = ellipsoid.to_cartesian(sample.lon, sample.lat, sample.undulation, factor);
        geoid.write_vertex(&g.to_record())?;

        let t = ellipsoid.to_cartesian(sample.lon, sample.lat, helip, factor);
        topo.write_vertex(&t.to_record())?;
    }
    Ok(grid.len())
}

/// What a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub target_step: u32,
    pub undulation_native_step: f64,
    pub elevation_native_step: f64,
    /// Vertices per output file
    pub samples: usize,
    pub rows: usize,
    pub columns: usize,
    pub exaggerations: Vec<u32>,
    pub outputs: Vec<OutputFiles>,
    pub elapsed_secs: f64,
}

fn open_grid(path: &Path, kind: GridKind) -> Result<GridReader<BufReader<File>>> {
    let file = File::open(path).map_err(|e| {
        ExportError::Io(std::io::Error::new(
            e.kind(),
            format!("cannot open {} grid '{}': {}", kind, path.display(), e),
        ))
    })?;
    Ok(GridReader::new(BufReader::new(file), kind))
}

/// Write every factor of `output_set` from `grid`, then commit
///
/// All writer tasks are awaited before the set is committed or, on error or
/// cancellation, dropped (which rolls the staged files back).
pub async fn write_outputs(
    grid: Arc<PairedGrid>,
    mut output_set: OutputSet,
    cancel: &CancelFlag,
) -> Result<Vec<OutputFiles>> {
    let tasks = output_set.take_outputs().into_iter().map(|mut out| {
        let grid = Arc::clone(&grid);
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let written = write_factor(
                &grid,
                &Ellipsoid::WGS84,
                out.factor,
                &mut out.geoid,
                &mut out.topo,
                &cancel,
            )?;
            out.flush()?;
            debug!("  factor {}: {} vertices per surface", out.factor, written);
            Ok::<_, ExportError>(out)
        })
    });

    let mut finished = Vec::new();
    let mut first_error: Option<ExportError> = None;
    for joined in join_all(tasks).await {
        match joined {
            Ok(Ok(out)) => finished.push(out),
            Ok(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e.into());
                }
            }
        }
    }
    if cancel.is_cancelled() {
        return Err(ExportError::Interrupted);
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    output_set.commit(finished)
}

/// Run the whole conversion for `config`
pub async fn run_export(config: &ExportConfig, cancel: &CancelFlag) -> Result<ExportSummary> {
    let t0 = Instant::now();
    let m0 = memprof::checkpoint("run_export start");

    // Step 1: both grids, each on its own blocking task
    info!(
        "[1/4] Decimating grids to {}' (undulation: {}, elevation: {})...",
        config.target_step,
        config.undulation_grid.display(),
        config.elevation_grid.display()
    );
    let undulation_task = {
        let path = config.undulation_grid.clone();
        let step = config.target_step;
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let mut reader = open_grid(&path, GridKind::Undulation)?;
            decimate_undulation(&mut reader, step, &cancel)
        })
    };
    let elevation_task = {
        let path = config.elevation_grid.clone();
        let step = config.target_step;
        let scale = config.elevation_scale;
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let mut reader = open_grid(&path, GridKind::Elevation)?;
            decimate_elevation(&mut reader, step, scale, &cancel)
        })
    };
    let (undulation, elevation) = tokio::try_join!(undulation_task, elevation_task)?;
    // A grid error seen after an interrupt is a consequence of it
    cancel.check()?;
    let (undulation, elevation) = (undulation?, elevation?);

    let m1 = memprof::delta("after decimation", m0);
    let t1 = memprof::time_delta("after decimation", t0, t0);
    info!(
        "  Undulation: native {}', stride {}, {} samples in {} bands",
        undulation.native_step,
        undulation.stride,
        undulation.samples.len(),
        undulation.bands
    );
    info!(
        "  Elevation: native {}', stride {}, {} samples in {} rows",
        elevation.native_step,
        elevation.stride,
        elevation.values.len(),
        elevation.rows()
    );

    // Step 2: pair up before anything is written
    info!("[2/4] Pairing samples...");
    let undulation_native_step = undulation.native_step;
    let elevation_native_step = elevation.native_step;
    let (rows, columns) = (elevation.rows(), elevation.columns);
    let grid = Arc::new(PairedGrid::new(undulation.samples, elevation.values)?);
    info!("  {} paired samples", grid.len());

    // Step 3: staged outputs
    info!(
        "[3/4] Staging {} output pair(s) in {}...",
        config.exaggerations.len(),
        config.output_root.display()
    );
    let output_set = OutputSet::create(config)?;

    // Step 4: one writer task per factor, each owning its two files
    info!("[4/4] Writing vertices...");
    let outputs = write_outputs(Arc::clone(&grid), output_set, cancel).await?;
    memprof::delta("after export", m1);
    memprof::time_delta("after export", t0, t1);

    let summary = ExportSummary {
        target_step: config.target_step,
        undulation_native_step,
        elevation_native_step,
        samples: grid.len(),
        rows,
        columns,
        exaggerations: config.exaggerations.clone(),
        outputs,
        elapsed_secs: t0.elapsed().as_secs_f64(),
    };
    info!(
        "Export complete: {} vertices × {} surface(s) in {:.3}s",
        summary.samples,
        summary.outputs.len() * 2,
        summary.elapsed_secs
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use crate::geodesy::to_cartesian;
    use crate::grid::synthetic::{write_elevation_grid, write_undulation_grid};
    use std::fs;
    use std::path::PathBuf;

    fn sample(lat: f64, lon: f64, undulation: f64) -> UndulationSample {
        UndulationSample {
            lat,
            lon,
            undulation,
        }
    }

    struct Fixture {
        dir: PathBuf,
    }

    impl Fixture {
        /// Synthetic grids at the given native steps (degrees)
        fn new(undulation_step: u32, elevation_step: u32) -> Self {
            let dir =
                std::env::temp_dir().join(format!("geoid_mesh_pipe_{}", uuid::Uuid::new_v4()));
            fs::create_dir_all(&dir).unwrap();

            let mut egm = Vec::new();
            write_undulation_grid(&mut egm, undulation_step, |lat, lon| {
                lat / 10.0 + lon / 1000.0
            })
            .unwrap();
            fs::write(dir.join("egm.txt"), egm).unwrap();

            let mut etopo = Vec::new();
            write_elevation_grid(&mut etopo, elevation_step, |lat, _| lat / 100.0).unwrap();
            fs::write(dir.join("etopo.txt"), etopo).unwrap();

            Fixture { dir }
        }

        fn config(&self, factors: Vec<u32>, step: u32) -> ExportConfig {
            ExportConfig::from_sources(ConfigFile {
                undulation_grid: Some(self.dir.join("egm.txt")),
                elevation_grid: Some(self.dir.join("etopo.txt")),
                exaggerations: Some(factors),
                target_step: Some(step),
                output_root: Some(self.dir.join("out")),
                ..Default::default()
            })
            .unwrap()
        }

        fn output_exists(&self) -> bool {
            let out = self.dir.join("out");
            out.exists() && fs::read_dir(out).unwrap().next().is_some()
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    fn parse_z(line: &str) -> f64 {
        line.split_whitespace().nth(3).unwrap().parse().unwrap()
    }

    #[test]
    fn test_paired_grid_rejects_length_mismatch() {
        let result = PairedGrid::new(vec![sample(0.0, 0.0, 1.0)], vec![1.0, 2.0]);
        match result {
            Err(ExportError::Alignment {
                undulation,
                elevation,
            }) => {
                assert_eq!(undulation, 1);
                assert_eq!(elevation, 2);
            }
            other => panic!("expected alignment error, got {:?}", other),
        }
    }

    #[test]
    fn test_paired_grid_iterates_in_order() {
        let grid = PairedGrid::new(
            vec![sample(10.0, 0.0, 1.0), sample(10.0, 5.0, 2.0)],
            vec![100.0, 200.0],
        )
        .unwrap();
        let pairs: Vec<(f64, f64)> = grid.iter().map(|(s, h)| (s.lon, h)).collect();
        assert_eq!(pairs, vec![(0.0, 100.0), (5.0, 200.0)]);
        assert_eq!(grid.len(), 2);
    }

    #[test]
    fn test_write_factor_geoid_and_topo_heights() {
        let grid = PairedGrid::new(vec![sample(0.0, 0.0, 10.0)], vec![100.0]).unwrap();
        let mut geoid: Vec<u8> = Vec::new();
        let mut topo: Vec<u8> = Vec::new();
        let n = write_factor(
            &grid,
            &Ellipsoid::WGS84,
            2,
            &mut geoid,
            &mut topo,
            &CancelFlag::new(),
        )
        .unwrap();
        assert_eq!(n, 1);
        // a + 2 × 10 and a + 2 × (100 + 10)
        assert_eq!(
            String::from_utf8(geoid).unwrap(),
            "v 6.378157 0.000000 0.000000\n"
        );
        assert_eq!(
            String::from_utf8(topo).unwrap(),
            "v 6.378357 0.000000 0.000000\n"
        );
    }

    #[test]
    fn test_write_factor_stops_when_cancelled() {
        let grid = PairedGrid::new(vec![sample(0.0, 0.0, 0.0)], vec![0.0]).unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut sink: Vec<u8> = Vec::new();
        let mut other: Vec<u8> = Vec::new();
        let result = write_factor(&grid, &Ellipsoid::WGS84, 1, &mut sink, &mut other, &cancel);
        assert!(matches!(result, Err(ExportError::Interrupted)));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_export() {
        let fx = Fixture::new(30, 30);
        let cfg = fx.config(vec![1, 10], 3600);
        let summary = run_export(&cfg, &CancelFlag::new()).await.unwrap();

        // Bands 90, 30, −30, −90 × longitudes 0..300 by 60
        assert_eq!(summary.samples, 24);
        assert_eq!(summary.rows, 4);
        assert_eq!(summary.columns, 6);
        assert_eq!(summary.outputs.len(), 2);

        let band_lats = [90.0, 30.0, -30.0, -90.0];
        for files in &summary.outputs {
            for path in [&files.geoid, &files.topo] {
                let text = fs::read_to_string(path).unwrap();
                let lines: Vec<&str> = text.lines().collect();
                assert_eq!(lines.len(), 24);
                for (i, line) in lines.iter().enumerate() {
                    let lat: f64 = band_lats[i / 6];
                    assert_eq!(parse_z(line).signum(), lat.signum(), "line {}", i);
                }
            }
        }

        // Second geoid vertex of factor 10: lat 90, lon 60, undulation 9.06
        let geoid_f10 = fs::read_to_string(&summary.outputs[1].geoid).unwrap();
        let expected = to_cartesian(60.0, 90.0, 9.06, 10).to_record().to_string();
        assert_eq!(geoid_f10.lines().nth(1).unwrap(), expected);

        // Topography at (30, 0): 0.3 km → 300 m plus 3.0 m undulation
        let topo_f1 = fs::read_to_string(&summary.outputs[0].topo).unwrap();
        let expected = to_cartesian(0.0, 30.0, 303.0, 1).to_record().to_string();
        assert_eq!(topo_f1.lines().nth(6).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_different_native_steps_pair_up() {
        // 20° undulation (stride 3) against 30° elevation (stride 2)
        let fx = Fixture::new(20, 30);
        let cfg = fx.config(vec![1], 3600);
        let summary = run_export(&cfg, &CancelFlag::new()).await.unwrap();
        assert_eq!(summary.undulation_native_step, 1200.0);
        assert_eq!(summary.samples, 24);
    }

    #[tokio::test]
    async fn test_alignment_fault_writes_nothing() {
        // At the native step the undulation bands lose their last longitude
        // while the elevation rows keep all of theirs
        let fx = Fixture::new(30, 30);
        let cfg = fx.config(vec![1], 1800);
        let result = run_export(&cfg, &CancelFlag::new()).await;
        match result {
            Err(ExportError::Alignment {
                undulation,
                elevation,
            }) => {
                assert_eq!(undulation, 7 * 11);
                assert_eq!(elevation, 7 * 12);
            }
            other => panic!("expected alignment error, got {:?}", other),
        }
        assert!(!fx.output_exists());
    }

    #[tokio::test]
    async fn test_resolution_mismatch() {
        let fx = Fixture::new(30, 30);
        let cfg = fx.config(vec![1], 2700);
        let result = run_export(&cfg, &CancelFlag::new()).await;
        assert!(matches!(
            result,
            Err(ExportError::ResolutionMismatch { .. })
        ));
        assert!(!fx.output_exists());
    }

    #[tokio::test]
    async fn test_cancelled_run_leaves_nothing() {
        let fx = Fixture::new(30, 30);
        let cfg = fx.config(vec![1, 2], 3600);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = run_export(&cfg, &cancel).await;
        assert!(matches!(result, Err(ExportError::Interrupted)));
        assert!(!fx.output_exists());
    }

    #[tokio::test]
    async fn test_interrupt_wins_over_later_grid_error() {
        let fx = Fixture::new(30, 30);
        let etopo = fx.dir.join("etopo.txt");
        let mut text = fs::read_to_string(&etopo).unwrap();
        text.push_str("0 x\n");
        fs::write(&etopo, text).unwrap();

        let cfg = fx.config(vec![1], 3600);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = run_export(&cfg, &cancel).await;
        assert!(matches!(result, Err(ExportError::Interrupted)));
        assert!(!fx.output_exists());
    }

    #[tokio::test]
    async fn test_interrupt_after_staging_rolls_back() {
        let fx = Fixture::new(30, 30);
        let cfg = fx.config(vec![1, 2, 5], 3600);
        let output_set = OutputSet::create(&cfg).unwrap();
        assert!(fx.output_exists());

        let n = CANCEL_CHECK_INTERVAL * 3;
        let grid = PairedGrid::new(
            (0..n).map(|i| sample(0.0, i as f64 / 100.0, 1.0)).collect(),
            vec![10.0; n],
        )
        .unwrap();

        let cancel = CancelFlag::new();
        let handle = cancel.clone();
        tokio::spawn(async move { handle.cancel() }).await.unwrap();

        let result = write_outputs(Arc::new(grid), output_set, &cancel).await;
        assert!(matches!(result, Err(ExportError::Interrupted)));
        assert!(!fx.output_exists());
    }

    #[tokio::test]
    async fn test_write_outputs_commits_every_factor() {
        let fx = Fixture::new(30, 30);
        let cfg = fx.config(vec![3, 1], 3600);
        let output_set = OutputSet::create(&cfg).unwrap();
        let grid = PairedGrid::new(vec![sample(45.0, 90.0, 2.0)], vec![8.0]).unwrap();

        let files = write_outputs(Arc::new(grid), output_set, &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(files.iter().map(|f| f.factor).collect::<Vec<_>>(), vec![1, 3]);
        let topo = fs::read_to_string(&files[1].topo).unwrap();
        let expected = to_cartesian(90.0, 45.0, 10.0, 3).to_record().to_string();
        assert_eq!(topo, format!("{}\n", expected));
    }
}
