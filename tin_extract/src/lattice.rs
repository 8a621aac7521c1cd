//! Regular grid surface with a null sentinel for gaps.

use log::debug;

use crate::error::{ExtractError, Result};
use crate::geometry::{BoundingBox, Point3};
use crate::model::{FeatureKind, SurfaceModel};

/// Null sentinel used by [`Lattice::from_surface`].
pub const DEFAULT_NULL_VALUE: f64 = -98766.0;

/// Grid of elevations. Node `(row, col)` sits at
/// `(origin_x + col * dx, origin_y + row * dy)` and its value is stored at
/// `values[row * cols + col]`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Lattice {
    pub origin_x: f64,
    pub origin_y: f64,
    pub dx: f64,
    pub dy: f64,
    pub rows: usize,
    pub cols: usize,
    pub null_value: f64,
    pub values: Vec<f64>,
}

impl Lattice {
    /// Grid with every node null.
    pub fn new(origin: (f64, f64), dx: f64, dy: f64, rows: usize, cols: usize, null_value: f64) -> Self {
        Self {
            origin_x: origin.0,
            origin_y: origin.1,
            dx,
            dy,
            rows,
            cols,
            null_value,
            values: vec![null_value; rows * cols],
        }
    }

    pub fn set(&mut self, row: usize, col: usize, z: f64) {
        if row < self.rows && col < self.cols {
            self.values[row * self.cols + col] = z;
        }
    }

    /// Elevation at a node, `None` when null or out of range.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        let z = *self.values.get(row * self.cols + col)?;
        (z != self.null_value).then_some(z)
    }

    pub fn node(&self, row: usize, col: usize) -> Option<Point3> {
        self.get(row, col).map(|z| {
            Point3::new(
                self.origin_x + col as f64 * self.dx,
                self.origin_y + row as f64 * self.dy,
                z,
            )
        })
    }

    /// Lowest non-null elevation.
    pub fn z_min(&self) -> Option<f64> {
        self.values
            .iter()
            .copied()
            .filter(|z| *z != self.null_value)
            .fold(None, |acc: Option<f64>, z| Some(acc.map_or(z, |m| m.min(z))))
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        if self.rows == 0 || self.cols == 0 {
            return None;
        }
        Some(BoundingBox::new(
            self.origin_x,
            self.origin_y,
            self.origin_x + (self.cols - 1) as f64 * self.dx,
            self.origin_y + (self.rows - 1) as f64 * self.dy,
        ))
    }

    /// Checks the value array against the declared dimensions.
    pub fn validate(&self) -> Result<()> {
        if self.values.len() != self.rows * self.cols {
            return Err(ExtractError::InvalidModel(format!(
                "lattice has {} values for {} x {} nodes",
                self.values.len(),
                self.rows,
                self.cols
            )));
        }
        if !positive(self.dx) || !positive(self.dy) {
            return Err(ExtractError::InvalidModel("lattice spacing must be positive".into()));
        }
        Ok(())
    }

    /// Samples a triangulated surface at every grid node. Nodes outside the
    /// triangulation are null.
    pub fn from_surface(model: &SurfaceModel, dx: f64, dy: f64) -> Result<Self> {
        if !model.is_triangulated() {
            return Err(ExtractError::NotTriangulated(FeatureKind::Lattice));
        }
        if !positive(dx) || !positive(dy) {
            return Err(ExtractError::InvalidModel("lattice spacing must be positive".into()));
        }
        let bbox = model
            .bbox()
            .ok_or_else(|| ExtractError::InvalidModel("surface has no points".into()))?;
        let cols = ((bbox.max_x - bbox.min_x) / dx).floor() as usize + 1;
        let rows = ((bbox.max_y - bbox.min_y) / dy).floor() as usize + 1;
        let mut lattice = Lattice::new((bbox.min_x, bbox.min_y), dx, dy, rows, cols, DEFAULT_NULL_VALUE);
        for row in 0..rows {
            for col in 0..cols {
                let x = bbox.min_x + col as f64 * dx;
                let y = bbox.min_y + row as f64 * dy;
                if let Some(z) = model.elevation_at(x, y) {
                    lattice.set(row, col, z);
                }
            }
        }
        debug!("sampled {rows} x {cols} lattice from surface");
        Ok(lattice)
    }

    pub fn load(path: &str) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let lattice: Lattice = serde_json::from_str(&data)?;
        lattice.validate()?;
        Ok(lattice)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}
