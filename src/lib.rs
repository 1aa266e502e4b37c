//! Geoid and topography meshes from global grids
//!
//! Converts a geoid undulation grid and an elevation grid into paired OBJ
//! vertex files in WGS84 geocentric coordinates, one pair per vertical
//! exaggeration factor.
//!
//! Module organization:
//! - `grid`: grid readers and decimation to a common output step
//! - `geodesy`: ellipsoid projection and vertex records
//! - `export`: staged output files
//! - `pipeline`: the paired export run
//! - `config`: run configuration
//! - `cancel`: cooperative cancellation

pub mod cancel;
pub mod config;
pub mod error;
pub mod export;
pub mod geodesy;
pub mod grid;
pub mod memprof;
pub mod pipeline;

pub use cancel::CancelFlag;
pub use config::{ConfigFile, DefaultApplied, ExportConfig};
pub use error::{ExportError, GridKind, Result};
pub use pipeline::{run_export, ExportSummary, PairedGrid};
