use crate::callback::PointBatch;
use crate::error::Result;
use crate::model::{
    FeatureKind, FeaturePoints, FeatureState, SurfaceModel, NULL_FEATURE_ID, NULL_USER_TAG,
};

use super::Query;

/// Flags the points referenced by raw features of an untriangulated model.
/// Only random and feature spots on a raw model need it.
pub(crate) fn spot_mask(model: &SurfaceModel, kind: FeatureKind) -> Option<Vec<bool>> {
    if model.is_triangulated()
        || !matches!(kind, FeatureKind::RandomSpots | FeatureKind::FeatureSpot)
    {
        return None;
    }
    let mut mask = vec![false; model.num_points()];
    for feature in model.features() {
        if !matches!(feature.state, FeatureState::Data | FeatureState::OffsetsArray) {
            continue;
        }
        match &feature.points {
            FeaturePoints::Range { first, count } => {
                for flag in mask.iter_mut().skip(*first).take(*count) {
                    *flag = true;
                }
            }
            FeaturePoints::Offsets(offsets) => {
                for &p in offsets {
                    if let Some(flag) = mask.get_mut(p) {
                        *flag = true;
                    }
                }
            }
            FeaturePoints::Chain { .. } | FeaturePoints::Stored(_) => {}
        }
    }
    Some(mask)
}

/// Kind specific selection of point `p`, before any fence test.
pub(crate) fn point_selected(
    model: &SurfaceModel,
    kind: FeatureKind,
    p: usize,
    mask: Option<&[bool]>,
) -> bool {
    let on_feature = |p: usize| match mask {
        Some(mask) => mask.get(p).copied().unwrap_or(false),
        None => model.is_on_feature(p),
    };
    let tin = model.is_triangulated();
    match kind {
        FeatureKind::Spots => !(tin && model.is_void_point(p)),
        FeatureKind::RandomSpots if tin => {
            model.has_neighbors(p) && !model.is_void_point(p) && !on_feature(p)
        }
        FeatureKind::RandomSpots => !on_feature(p),
        FeatureKind::FeatureSpot if tin => {
            model.has_neighbors(p) && !model.is_void_point(p) && on_feature(p)
        }
        FeatureKind::FeatureSpot => on_feature(p),
        FeatureKind::TinPoint => tin && model.has_neighbors(p) && !model.is_void_point(p),
        _ => false,
    }
}

pub(super) fn extract(query: &mut Query<'_, '_>, kind: FeatureKind) -> Result<()> {
    let model = query.model;
    let mask = spot_mask(model, kind);
    let mut batch = PointBatch::new(kind, NULL_USER_TAG, NULL_FEATURE_ID, query.max_spots);
    for p in 0..model.num_points() {
        if !point_selected(model, kind, p, mask.as_deref()) {
            continue;
        }
        let point = model.point(p);
        if let Some(f) = &query.fence {
            if !f.clip.point_passes(point, f.option) {
                continue;
            }
        }
        batch.push(point, &mut query.bridge)?;
    }
    batch.flush(&mut query.bridge)
}
