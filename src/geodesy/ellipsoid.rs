use super::vertex::Vertex;

/// Reference ellipsoid given by semi-major axis and flattening
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis (meters)
    pub a: f64,
    /// Flattening
    pub f: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_223_563,
    };

    pub fn wgs84() -> Self {
        Self::WGS84
    }

    /// Semi-minor axis (meters)
    pub fn b(&self) -> f64 {
        self.a - self.a * self.f
    }

    /// First eccentricity squared, from the linear eccentricity
    pub fn e2(&self) -> f64 {
        let b = self.b();
        let linear = (self.a * self.a - b * b).sqrt();
        let e = linear / self.a;
        e * e
    }

    /// Radius of curvature in the prime vertical at `lat` (radians)
    pub fn prime_vertical_radius(&self, lat: f64) -> f64 {
        let s = lat.sin();
        self.a / (1.0 - self.e2() * s * s).sqrt()
    }

    /// Geodetic (degrees, meters) to geocentric Cartesian coordinates
    ///
    /// Only the height is multiplied by `exaggeration`.
    pub fn to_cartesian(&self, lon_deg: f64, lat_deg: f64, height: f64, exaggeration: u32) -> Vertex {
        let h = height * f64::from(exaggeration);
        let lon = lon_deg.to_radians();
        let lat = lat_deg.to_radians();

        let b = self.b();
        let v = self.prime_vertical_radius(lat);

        Vertex {
            x: (v + h) * lat.cos() * lon.cos(),
            y: (v + h) * lat.cos() * lon.sin(),
            z: ((b * b) / (self.a * self.a) * v + h) * lat.sin(),
        }
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::WGS84
    }
}

/// [`Ellipsoid::to_cartesian`] on WGS84
pub fn to_cartesian(lon_deg: f64, lat_deg: f64, height: f64, exaggeration: u32) -> Vertex {
    Ellipsoid::WGS84.to_cartesian(lon_deg, lat_deg, height, exaggeration)
}
