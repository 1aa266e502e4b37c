//! Converter configuration
//!
//! Values come from, lowest to highest precedence: built-in defaults, an
//! optional JSON config file, then command-line flags. The binary turns its
//! flags into a [`ConfigFile`] and overlays it on the loaded file, so every
//! source goes through the same validation in [`ExportConfig::from_sources`].
//!
//! Example config file:
//! ```json
//! {
//!   "undulation_grid": "data/egm2008_2.5min.txt",
//!   "elevation_grid": "data/etopo2.txt",
//!   "exaggerations": [1, 10, 50],
//!   "target_step": 30
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ExportError, Result};

/// Exaggeration used when none is given anywhere
pub const DEFAULT_EXAGGERATION: u32 = 1;

/// Output step in arc-minutes used when none is given anywhere
pub const DEFAULT_TARGET_STEP: u32 = 60;

/// Native elevation unit is kilometers
pub const DEFAULT_ELEVATION_SCALE: f64 = 1000.0;

pub const DEFAULT_GEOID_PREFIX: &str = "geoid";
pub const DEFAULT_TOPO_PREFIX: &str = "topo";

/// A setting that fell back to its built-in default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultApplied {
    Exaggeration,
    TargetStep,
}

/// Partial configuration, as read from JSON or assembled from CLI flags
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub undulation_grid: Option<PathBuf>,
    pub elevation_grid: Option<PathBuf>,
    pub exaggerations: Option<Vec<u32>>,
    pub target_step: Option<u32>,
    pub output_root: Option<PathBuf>,
    pub elevation_scale: Option<f64>,
    pub geoid_prefix: Option<String>,
    pub topo_prefix: Option<String>,
}

impl ConfigFile {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ExportError::Config(format!("cannot read config file '{}': {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Fields set in `over` replace the ones in `self`
    pub fn overlay(self, over: ConfigFile) -> ConfigFile {
        ConfigFile {
            undulation_grid: over.undulation_grid.or(self.undulation_grid),
            elevation_grid: over.elevation_grid.or(self.elevation_grid),
            exaggerations: over.exaggerations.or(self.exaggerations),
            target_step: over.target_step.or(self.target_step),
            output_root: over.output_root.or(self.output_root),
            elevation_scale: over.elevation_scale.or(self.elevation_scale),
            geoid_prefix: over.geoid_prefix.or(self.geoid_prefix),
            topo_prefix: over.topo_prefix.or(self.topo_prefix),
        }
    }
}

/// Validated run parameters, passed explicitly to every stage
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// EGM-style `lat lon undulation` grid
    pub undulation_grid: PathBuf,

    /// ETOPO-style elevation grid
    pub elevation_grid: PathBuf,

    /// Vertical exaggeration factors, one output pair each.
    /// Positive, without duplicates, in the order given.
    pub exaggerations: Vec<u32>,

    /// Output step in arc-minutes
    pub target_step: u32,

    /// Directory that receives the geoid and topography output directories
    pub output_root: PathBuf,

    /// Multiplier from the elevation grid's unit to meters
    pub elevation_scale: f64,

    pub geoid_prefix: String,
    pub topo_prefix: String,

    /// Settings that were not supplied and took their default
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ExportConfig {
    /// Apply defaults to a merged [`ConfigFile`] and validate the result
    ///
    /// Grid paths must name existing files; this runs before any grid I/O.
    pub fn from_sources(src: ConfigFile) -> Result<Self> {
        let mut defaults_applied = Vec::new();

        let undulation_grid = require_file(src.undulation_grid, "undulation")?;
        let elevation_grid = require_file(src.elevation_grid, "elevation")?;

        let exaggerations = match src.exaggerations {
            Some(factors) => dedup_factors(&factors)?,
            None => {
                defaults_applied.push(DefaultApplied::Exaggeration);
                vec![DEFAULT_EXAGGERATION]
            }
        };

        let target_step = match src.target_step {
            Some(0) => {
                return Err(ExportError::Config(
                    "output step must be a positive integer number of arc-minutes".to_string(),
                ))
            }
            Some(step) => step,
            None => {
                defaults_applied.push(DefaultApplied::TargetStep);
                DEFAULT_TARGET_STEP
            }
        };

        let elevation_scale = src.elevation_scale.unwrap_or(DEFAULT_ELEVATION_SCALE);
        if !elevation_scale.is_finite() || elevation_scale == 0.0 {
            return Err(ExportError::Config(format!(
                "elevation scale must be a finite, non-zero number, got {}",
                elevation_scale
            )));
        }

        let geoid_prefix = valid_prefix(src.geoid_prefix, DEFAULT_GEOID_PREFIX)?;
        let topo_prefix = valid_prefix(src.topo_prefix, DEFAULT_TOPO_PREFIX)?;
        if geoid_prefix == topo_prefix {
            return Err(ExportError::Config(format!(
                "geoid and topography outputs cannot share the prefix '{}'",
                geoid_prefix
            )));
        }

        Ok(Self {
            undulation_grid,
            elevation_grid,
            exaggerations,
            target_step,
            output_root: src.output_root.unwrap_or_else(|| PathBuf::from(".")),
            elevation_scale,
            geoid_prefix,
            topo_prefix,
            defaults_applied,
        })
    }

    /// e.g. `geoid_step_60`
    pub fn geoid_dir_name(&self) -> String {
        format!("{}_step_{}", self.geoid_prefix, self.target_step)
    }

    /// e.g. `topo_step_60`
    pub fn topo_dir_name(&self) -> String {
        format!("{}_step_{}", self.topo_prefix, self.target_step)
    }

    /// e.g. `geoid_f10_step60.obj`
    pub fn geoid_file_name(&self, factor: u32) -> String {
        format!("{}_f{}_step{}.obj", self.geoid_prefix, factor, self.target_step)
    }

    /// e.g. `topo_f10_step60.obj`
    pub fn topo_file_name(&self, factor: u32) -> String {
        format!("{}_f{}_step{}.obj", self.topo_prefix, factor, self.target_step)
    }
}

fn require_file(path: Option<PathBuf>, which: &str) -> Result<PathBuf> {
    let path =
        path.ok_or_else(|| ExportError::Config(format!("no {} grid path given", which)))?;
    if !path.is_file() {
        return Err(ExportError::Config(format!(
            "{} grid '{}' is not a readable file",
            which,
            path.display()
        )));
    }
    Ok(path)
}

fn dedup_factors(factors: &[u32]) -> Result<Vec<u32>> {
    if factors.is_empty() {
        return Err(ExportError::Config(
            "at least one exaggeration factor is required".to_string(),
        ));
    }
    let mut out: Vec<u32> = Vec::with_capacity(factors.len());
    for &factor in factors {
        if factor == 0 {
            return Err(ExportError::Config(
                "exaggeration factors must be positive integers, got 0".to_string(),
            ));
        }
        if !out.contains(&factor) {
            out.push(factor);
        }
    }
    Ok(out)
}

fn valid_prefix(prefix: Option<String>, default: &str) -> Result<String> {
    let prefix = prefix.unwrap_or_else(|| default.to_string());
    if prefix.is_empty() || prefix.contains(['/', '\\']) || prefix.starts_with('.') {
        return Err(ExportError::Config(format!(
            "invalid output prefix '{}'",
            prefix
        )));
    }
    Ok(prefix)
}
