use crate::clip::ActiveFence;
use crate::error::Result;
use crate::geometry::Point3;
use crate::model::{FeatureKind, SurfaceModel, NULL_FEATURE_ID, NULL_USER_TAG};
use crate::traversal;

use super::{clip_pieces, Query};

/// Hull polyline after the fence has been applied.
pub(crate) fn hull_pieces(model: &SurfaceModel, fence: Option<&ActiveFence>) -> Vec<Vec<Point3>> {
    let hull = traversal::hull_polyline(model);
    if hull.len() < 2 {
        return Vec::new();
    }
    clip_pieces(fence, hull)
}

/// Vertical panel hanging from hull segment `a-b` down to `z_min`.
pub(crate) fn skirt(a: Point3, b: Point3, z_min: f64) -> [Point3; 5] {
    [
        a,
        b,
        Point3::new(b.x, b.y, z_min),
        Point3::new(a.x, a.y, z_min),
        a,
    ]
}

/// Tag and id reported with the triangulation hull: those of the first hull
/// feature in the table, if any.
pub(crate) fn hull_identity(model: &SurfaceModel) -> (u64, u64) {
    model
        .features()
        .iter()
        .find(|f| f.kind == FeatureKind::Hull)
        .map_or((NULL_USER_TAG, NULL_FEATURE_ID), |f| (f.user_tag, f.feature_id))
}

pub(super) fn extract(query: &mut Query<'_, '_>, kind: FeatureKind) -> Result<()> {
    let model = query.model;
    let pieces = hull_pieces(model, query.fence.as_ref());
    if kind == FeatureKind::TinHull {
        let (tag, id) = hull_identity(model);
        for piece in &pieces {
            query.bridge.deliver(kind, tag, id, piece)?;
        }
        return Ok(());
    }
    let z_min = model.z_min();
    for piece in &pieces {
        for w in piece.windows(2) {
            let panel = skirt(w[0], w[1], z_min);
            query
                .bridge
                .deliver(kind, NULL_USER_TAG, NULL_FEATURE_ID, &panel)?;
        }
    }
    Ok(())
}
