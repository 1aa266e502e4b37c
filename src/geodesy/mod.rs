//! Geodetic projection
//!
//! - `ellipsoid.rs`: WGS84 geodetic → geocentric conversion
//! - `vertex.rs`: Cartesian vertices and their OBJ records

pub mod ellipsoid;
pub mod vertex;

pub use ellipsoid::{to_cartesian, Ellipsoid};
pub use vertex::{format_vertex, Vertex, VertexRecord, EXPORT_SCALE};
