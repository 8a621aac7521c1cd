//! Triangle surface attributes: slope, aspect, height and flow direction.

use nalgebra::Vector3;
use std::f64::consts::{PI, TAU};

use crate::geometry::Point3;

/// Slope and orientation of one triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleAttributes {
    pub slope_degrees: f64,
    pub slope_percent: f64,
    /// Downhill direction in degrees clockwise from north. Flat triangles
    /// report `360.0`.
    pub aspect: f64,
    /// Mean vertex elevation.
    pub height: f64,
}

/// Ascent/descent directions in radians, counter-clockwise from the x axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowDirection {
    pub ascent: f64,
    pub descent: f64,
    /// Rise over run along the steepest direction.
    pub slope: f64,
}

fn upward_normal(a: Point3, b: Point3, c: Point3) -> Vector3<f64> {
    let va = Vector3::new(a.x, a.y, a.z);
    let ab = Vector3::new(b.x, b.y, b.z) - va;
    let ac = Vector3::new(c.x, c.y, c.z) - va;
    let n = ab.cross(&ac);
    if n.z < 0.0 {
        -n
    } else {
        n
    }
}

pub fn triangle_attributes(a: Point3, b: Point3, c: Point3) -> TriangleAttributes {
    let n = upward_normal(a, b, c);
    let height = (a.z + b.z + c.z) / 3.0;
    let horizontal = (n.x * n.x + n.y * n.y).sqrt();
    let length = n.norm();
    if horizontal <= f64::EPSILON * length || length <= f64::EPSILON {
        return TriangleAttributes {
            slope_degrees: 0.0,
            slope_percent: 0.0,
            aspect: 360.0,
            height,
        };
    }
    let slope = (n.z.abs() / length).clamp(-1.0, 1.0).acos();
    let mut aspect = n.x.atan2(n.y).to_degrees();
    if aspect < 0.0 {
        aspect += 360.0;
    }
    TriangleAttributes {
        slope_degrees: slope.to_degrees(),
        slope_percent: slope.tan() * 100.0,
        aspect,
        height,
    }
}

pub fn flow_direction(a: Point3, b: Point3, c: Point3) -> FlowDirection {
    let n = upward_normal(a, b, c);
    let horizontal = (n.x * n.x + n.y * n.y).sqrt();
    if horizontal <= f64::EPSILON * n.norm() || n.z.abs() <= f64::EPSILON {
        return FlowDirection {
            ascent: PI,
            descent: 0.0,
            slope: 0.0,
        };
    }
    let descent = n.y.atan2(n.x).rem_euclid(TAU);
    FlowDirection {
        ascent: (descent + PI).rem_euclid(TAU),
        descent,
        slope: horizontal / n.z,
    }
}

pub fn centroid(a: Point3, b: Point3, c: Point3) -> Point3 {
    Point3::new(
        (a.x + b.x + c.x) / 3.0,
        (a.y + b.y + c.y) / 3.0,
        (a.z + b.z + c.z) / 3.0,
    )
}
