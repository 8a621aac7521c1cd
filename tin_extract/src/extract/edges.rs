use crate::clip::{ActiveFence, ClipResult, FenceOption};
use crate::error::Result;
use crate::geometry::Point3;
use crate::model::{FeatureKind, SurfaceModel, NULL_FEATURE_ID, NULL_USER_TAG};
use crate::traversal::{self, Edges};

use super::{mark_inside, Query};

/// Pieces of edge `a-b` loaded under the fence. With the overlap option an
/// edge touching the fence is kept whole; otherwise it is clipped.
pub(crate) fn edge_pieces(
    model: &SurfaceModel,
    fence: Option<&ActiveFence>,
    a: usize,
    b: usize,
    inside: [bool; 2],
) -> Vec<Vec<Point3>> {
    let segment = vec![model.point(a), model.point(b)];
    let Some(f) = fence else {
        return vec![segment];
    };
    if f.option == FenceOption::Overlap && (inside[0] || inside[1]) {
        return vec![segment];
    }
    match f.clip.clip(&segment, f.option) {
        ClipResult::Rejected => Vec::new(),
        ClipResult::Whole => vec![segment],
        ClipResult::Split(pieces) => pieces,
    }
}

pub(super) fn extract(query: &mut Query<'_, '_>) -> Result<()> {
    let model = query.model;
    let fence = query.fence.as_ref();
    let marks = fence.map(|f| mark_inside(model, f, false));
    let range = marks
        .as_ref()
        .map_or(0..model.num_points(), |m| m.range());
    for (a, b) in Edges::range(model, range.start, range.end) {
        if model.has_voids() && traversal::edge_is_void(model, a, b) {
            continue;
        }
        let inside = match &marks {
            Some(m) => [m.is_inside(a), m.is_inside(b)],
            None => [false, false],
        };
        for piece in edge_pieces(model, fence, a, b, inside) {
            query
                .bridge
                .deliver(FeatureKind::TinLine, NULL_USER_TAG, NULL_FEATURE_ID, &piece)?;
        }
    }
    Ok(())
}
