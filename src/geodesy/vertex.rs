use std::fmt;

/// Meters per mesh export unit
pub const EXPORT_SCALE: f64 = 1_000_000.0;

/// Geocentric point in meters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vertex {
    pub fn to_record(self) -> VertexRecord {
        format_vertex(self.x, self.y, self.z)
    }
}

/// Point in mesh export units, written as an OBJ `v` line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl fmt::Display for VertexRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v {:.6} {:.6} {:.6}", self.x, self.y, self.z)
    }
}

/// Scale a point in meters down to export units
pub fn format_vertex(x: f64, y: f64, z: f64) -> VertexRecord {
    VertexRecord {
        x: x / EXPORT_SCALE,
        y: y / EXPORT_SCALE,
        z: z / EXPORT_SCALE,
    }
}
