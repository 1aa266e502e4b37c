//! Grid decimation
//!
//! Reads the two native grid layouts and resamples them to a coarser,
//! common step by nearest-sample thinning (no interpolation).
//!
//! Structure:
//! - `reader.rs`: rewindable numeric row reader
//! - `step.rs`: native step detection helpers and stride arithmetic
//! - `elevation.rs`: ETOPO-style rows (−180°…180° per latitude)
//! - `undulation.rs`: EGM-style `lat lon undulation` triplets
//! - `synthetic.rs`: generators for both layouts

pub mod elevation;
pub mod reader;
pub mod step;
pub mod synthetic;
pub mod undulation;

pub use elevation::{decimate_elevation, DecimatedElevation};
pub use reader::GridReader;
pub use undulation::{decimate_undulation, DecimatedUndulation, UndulationSample};
