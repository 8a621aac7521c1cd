use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::Point3;
use crate::model::{FeatureKind, FeaturePoints, FeatureState, SurfaceModel};
use crate::traversal;

/// A feature as written in a surface file. Features given by `indices`
/// reference the file's point array; the others carry their own points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub kind: FeatureKind,
    pub user_tag: u64,
    pub feature_id: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Point3>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indices: Vec<usize>,
}

/// JSON surface file: points, optional triangles and a feature table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceFile {
    pub points: Vec<Point3>,
    #[serde(default)]
    pub triangles: Vec<[usize; 3]>,
    #[serde(default)]
    pub features: Vec<FeatureRecord>,
}

impl SurfaceFile {
    pub fn load(path: &str) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Builds a model. Files with triangles give a triangulated model with
    /// the features linked; files without stay raw unless `triangulate`.
    pub fn into_model(self, triangulate: bool) -> Result<SurfaceModel> {
        let SurfaceFile {
            points,
            triangles,
            features,
        } = self;
        let tin = !triangles.is_empty();
        // indices must be resolved against the file order before sorting
        let resolved: Vec<(FeatureRecord, Vec<Point3>)> = features
            .into_iter()
            .map(|f| {
                let pts = if f.indices.is_empty() {
                    f.points.clone()
                } else {
                    f.indices.iter().filter_map(|&i| points.get(i).copied()).collect()
                };
                (f, pts)
            })
            .collect();
        let mut model = if tin {
            SurfaceModel::from_triangles(points, &triangles)?
        } else {
            SurfaceModel::from_points(points)
        };
        let base = model.num_points();
        for (record, pts) in resolved {
            if !tin && !record.indices.is_empty() && record.indices.iter().all(|&i| i < base) {
                model.add_feature_indices(
                    record.kind,
                    record.user_tag,
                    record.feature_id,
                    record.indices,
                )?;
            } else if !pts.is_empty() {
                model.add_feature(record.kind, record.user_tag, record.feature_id, &pts)?;
            }
        }
        if !tin && triangulate {
            info!("triangulating {} points", model.num_points());
            model.triangulate()?;
        }
        debug!(
            "surface file: {} points, {} features",
            model.num_points(),
            model.num_features()
        );
        Ok(model)
    }

    /// Snapshot of a model. Rolled back and deleted features are dropped.
    pub fn from_model(model: &SurfaceModel) -> Self {
        let triangles = if model.is_triangulated() {
            traversal::triangles(model).collect()
        } else {
            Vec::new()
        };
        let features = model
            .features()
            .iter()
            .enumerate()
            .filter(|(_, f)| !matches!(f.state, FeatureState::Rollback | FeatureState::Deleted))
            .map(|(i, f)| {
                let (points, indices) = match &f.points {
                    FeaturePoints::Stored(points) => (points.clone(), Vec::new()),
                    _ if model.is_triangulated() => (model.feature_points(i), Vec::new()),
                    _ => (Vec::new(), model.feature_point_indices(i)),
                };
                FeatureRecord {
                    kind: f.kind,
                    user_tag: f.user_tag,
                    feature_id: f.feature_id,
                    points,
                    indices,
                }
            })
            .collect();
        Self {
            points: model.points().to_vec(),
            triangles,
            features,
        }
    }
}
