use std::fmt;

use thiserror::Error;

/// Which of the two input grids an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridKind {
    /// Geoid undulation grid (EGM-style triplets)
    Undulation,
    /// Terrain/bathymetry grid (ETOPO-style rows)
    Elevation,
}

impl fmt::Display for GridKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridKind::Undulation => write!(f, "undulation"),
            GridKind::Elevation => write!(f, "elevation"),
        }
    }
}

/// Errors that can occur while converting grids to meshes
#[derive(Debug, Error)]
pub enum ExportError {
    /// Invalid paths, factors or steps (detected before any grid I/O)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Target step is not a whole multiple of a grid's native step
    #[error(
        "Resolution mismatch: target step {target}' is not a whole multiple of the {grid} grid's native step {native}'"
    )]
    ResolutionMismatch {
        grid: GridKind,
        native: f64,
        target: u32,
    },

    /// Decimated sequences do not line up sample for sample
    #[error(
        "Alignment error: {undulation} undulation samples vs {elevation} elevation samples"
    )]
    Alignment { undulation: usize, elevation: usize },

    /// Input ended before the expected number of bands/rows
    #[error("Incomplete {grid} grid: expected {expected} {what}, found {actual}")]
    IncompleteGrid {
        grid: GridKind,
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Row width or band layout the decimator cannot handle
    #[error("Irregular {grid} grid at line {line}: {detail}")]
    IrregularGrid {
        grid: GridKind,
        line: usize,
        detail: String,
    },

    /// Non-numeric or malformed row
    #[error("Parse error in {grid} grid at line {line}: {detail}")]
    Parse {
        grid: GridKind,
        line: usize,
        detail: String,
    },

    /// Run cancelled by the user; outputs were rolled back
    #[error("Interrupted")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Type alias for Results using ExportError
pub type Result<T> = std::result::Result<T, ExportError>;
