use log::debug;

use crate::callback::{Bridge, PointBatch};
use crate::clip::ActiveFence;
use crate::error::Result;
use crate::geometry::Point3;
use crate::model::{Feature, FeatureKind, FeatureState, SurfaceModel};
use crate::traversal;

use super::{clip_pieces, Query};

/// Drops group spot points rejected by the fence.
pub(crate) fn group_spot_filter(fence: Option<&ActiveFence>, points: Vec<Point3>) -> Vec<Point3> {
    match fence {
        Some(f) => points
            .into_iter()
            .filter(|p| f.clip.point_passes(*p, f.option))
            .collect(),
        None => points,
    }
}

/// Points loaded for a feature id request. A linked hull feature is replaced
/// by the current triangulation hull.
pub(crate) fn feature_id_points(model: &SurfaceModel, index: usize, feature: &Feature) -> Vec<Point3> {
    if feature.kind == FeatureKind::Hull && feature.state == FeatureState::Tin {
        traversal::hull_polyline(model)
    } else {
        model.feature_points(index)
    }
}

fn emit_group_spots(query: &mut Query<'_, '_>, index: usize, feature: &Feature) -> Result<()> {
    let points = group_spot_filter(query.fence.as_ref(), query.model.feature_points(index));
    let mut batch = PointBatch::new(
        feature.kind,
        feature.user_tag,
        feature.feature_id,
        query.max_spots,
    );
    for p in points {
        batch.push(p, &mut query.bridge)?;
    }
    batch.flush(&mut query.bridge)
}

fn emit_pieces(query: &mut Query<'_, '_>, feature: &Feature, points: Vec<Point3>) -> Result<()> {
    for piece in clip_pieces(query.fence.as_ref(), points) {
        query
            .bridge
            .deliver(feature.kind, feature.user_tag, feature.feature_id, &piece)?;
    }
    Ok(())
}

pub(super) fn group_spots(query: &mut Query<'_, '_>) -> Result<()> {
    let model = query.model;
    for (index, feature) in model.features().iter().enumerate() {
        if feature.kind == FeatureKind::GroupSpots && feature.state.is_live() {
            emit_group_spots(query, index, feature)?;
        }
    }
    Ok(())
}

/// Linear and area features of one kind.
pub(super) fn stored(query: &mut Query<'_, '_>, kind: FeatureKind) -> Result<()> {
    let model = query.model;
    for (index, feature) in model.features().iter().enumerate() {
        if feature.kind == kind && feature.state.is_live() {
            emit_pieces(query, feature, model.feature_points(index))?;
        }
    }
    Ok(())
}

pub(super) fn by_user_tag(query: &mut Query<'_, '_>, user_tag: u64) -> Result<()> {
    let model = query.model;
    let mut matched = 0;
    for (index, feature) in model.features().iter().enumerate() {
        if feature.user_tag != user_tag || !feature.state.is_live() {
            continue;
        }
        matched += 1;
        if feature.kind == FeatureKind::GroupSpots {
            emit_group_spots(query, index, feature)?;
        } else {
            emit_pieces(query, feature, model.feature_points(index))?;
        }
    }
    debug!("{matched} features carry user tag {user_tag}");
    Ok(())
}

pub(super) fn by_feature_id(query: &mut Query<'_, '_>, feature_id: u64) -> Result<()> {
    let model = query.model;
    for (index, feature) in model.features().iter().enumerate() {
        if feature.feature_id != feature_id || !loadable_by_id(feature.state) {
            continue;
        }
        emit_pieces(query, feature, feature_id_points(model, index, feature))?;
    }
    Ok(())
}

pub(crate) fn loadable_by_id(state: FeatureState) -> bool {
    !matches!(
        state,
        FeatureState::TinError | FeatureState::Rollback | FeatureState::Deleted
    )
}

pub(super) fn tin_errors(model: &SurfaceModel, bridge: &mut Bridge<'_>) -> Result<()> {
    for (index, feature) in model.features().iter().enumerate() {
        if feature.state == FeatureState::TinError {
            bridge.deliver(
                feature.kind,
                feature.user_tag,
                feature.feature_id,
                &model.feature_points(index),
            )?;
        }
    }
    Ok(())
}
