//! Basic 3D point type used throughout the crate.

use super::Point;

/// Representation of a 3D point.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Planar projection of this point.
    pub fn xy(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Returns `true` when both points share the same planar location.
    pub fn same_xy(&self, other: &Point3) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl From<geo_types::Coord<f64>> for Point3 {
    fn from(c: geo_types::Coord<f64>) -> Self {
        Point3::new(c.x, c.y, 0.0)
    }
}
