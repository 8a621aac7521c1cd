use crate::attributes::{centroid, flow_direction, triangle_attributes};
use crate::clip::{ActiveFence, ClipResult, FenceOption};
use crate::error::Result;
use crate::geometry::{point_in_triangle, BoundingBox, Point3};
use crate::model::{FeatureKind, SurfaceModel, NULL_FEATURE_ID, NULL_USER_TAG};
use crate::traversal::{self, Triangles};

use super::{mark_inside, Query};

/// Exact fence test for one triangle. `inside` holds the containment of its
/// three vertices.
pub(crate) fn triangle_passes(
    model: &SurfaceModel,
    fence: &ActiveFence,
    t: [usize; 3],
    inside: [bool; 3],
) -> bool {
    let [a, b, c] = t.map(|p| model.point(p));
    let ring = [a, b, c, a];
    let overlaps_box = BoundingBox::from_points(&ring)
        .is_some_and(|bb| bb.overlaps(&fence.clip.bbox()));
    let holds_fence = || point_in_triangle(fence.clip.anchor(), a.xy(), b.xy(), c.xy(), 1e-9);
    match fence.option {
        FenceOption::Overlap => {
            inside.iter().any(|&i| i)
                || (overlaps_box
                    && (fence.clip.clip(&ring, FenceOption::Overlap) != ClipResult::Rejected
                        || holds_fence()))
        }
        FenceOption::Inside => {
            inside.iter().all(|&i| i)
                && fence.clip.clip(&ring, FenceOption::Inside) == ClipResult::Whole
        }
        FenceOption::Outside => {
            !inside.iter().any(|&i| i)
                && (!overlaps_box
                    || (fence.clip.clip(&ring, FenceOption::Outside) == ClipResult::Whole
                        && !holds_fence()))
        }
    }
}

/// Points delivered for one triangle.
///
/// * `Triangle`: the closed ring `a b c a`.
/// * `TriangleInfo`: the three vertices, then `(p1, p2, p3)` as coordinates,
///   then `(void flag, aspect, slope percent)`.
/// * `TriangleIndex`: `(p1, p2, p3)`.
/// * `FlowArrow`: the centroid, then `(ascent, descent, slope)`.
pub(crate) fn triangle_payload(model: &SurfaceModel, kind: FeatureKind, t: [usize; 3]) -> Vec<Point3> {
    let [a, b, c] = t.map(|p| model.point(p));
    let indices = Point3::new(t[0] as f64, t[1] as f64, t[2] as f64);
    match kind {
        FeatureKind::TriangleInfo => {
            let attrs = triangle_attributes(a, b, c);
            let void = if model.has_voids() && traversal::triangle_is_void(model, t) {
                1.0
            } else {
                0.0
            };
            vec![a, b, c, indices, Point3::new(void, attrs.aspect, attrs.slope_percent)]
        }
        FeatureKind::TriangleIndex => vec![indices],
        FeatureKind::FlowArrow => {
            let flow = flow_direction(a, b, c);
            vec![
                centroid(a, b, c),
                Point3::new(flow.ascent, flow.descent, flow.slope),
            ]
        }
        _ => vec![a, b, c, a],
    }
}

/// Void triangles are skipped, except for `TriangleInfo` which flags them.
pub(crate) fn suppressed(model: &SurfaceModel, kind: FeatureKind, t: [usize; 3]) -> bool {
    kind != FeatureKind::TriangleInfo && model.has_voids() && traversal::triangle_is_void(model, t)
}

pub(super) fn extract(query: &mut Query<'_, '_>, kind: FeatureKind) -> Result<()> {
    let model = query.model;
    let Some(fence) = query.fence.as_ref() else {
        for t in traversal::triangles(model) {
            if !suppressed(model, kind, t) {
                let payload = triangle_payload(model, kind, t);
                query.bridge.deliver(kind, NULL_USER_TAG, NULL_FEATURE_ID, &payload)?;
            }
        }
        return Ok(());
    };
    let marks = mark_inside(model, fence, true);
    let range = marks.range();
    for t in Triangles::range(model, range.start, range.end) {
        if suppressed(model, kind, t) {
            continue;
        }
        // a triangle wholly inside has every vertex marked
        if fence.option == FenceOption::Inside && !t.iter().all(|&p| marks.is_marked(p)) {
            continue;
        }
        let inside = t.map(|p| marks.is_inside(p));
        if triangle_passes(model, fence, t, inside) {
            let payload = triangle_payload(model, kind, t);
            query.bridge.deliver(kind, NULL_USER_TAG, NULL_FEATURE_ID, &payload)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::callback::Collector;
    use crate::clip::{Fence, FenceOption, FenceType};
    use crate::extract::Extractor;
    use crate::geometry::{BoundingBox, Point3};
    use crate::model::FeatureKind;
    use crate::traversal::tests::grid;

    #[test]
    fn every_triangle_once_without_fence() {
        let m = grid(4);
        let mut c = Collector::new();
        Extractor::new(&m)
            .extract(FeatureKind::Triangle, 0, None, &mut c)
            .unwrap();
        assert_eq!(c.occurrences.len(), 18);
        assert!(c.occurrences.iter().all(|o| o.points.len() == 4 && o.points[0] == o.points[3]));
    }

    #[test]
    fn fence_options_partition_triangles() {
        let m = grid(5);
        let count = |option| {
            let fence = Fence::new(
                vec![
                    Point3::new(0.5, 0.5, 0.0),
                    Point3::new(2.5, 0.5, 0.0),
                    Point3::new(0.5, 2.5, 0.0),
                    Point3::new(0.5, 0.5, 0.0),
                ],
                FenceType::Shape,
                option,
            );
            let mut c = Collector::new();
            Extractor::new(&m)
                .extract(FeatureKind::TriangleIndex, 0, Some(&fence), &mut c)
                .unwrap();
            c.occurrences.len()
        };
        let (inside, overlap, outside) = (
            count(FenceOption::Inside),
            count(FenceOption::Overlap),
            count(FenceOption::Outside),
        );
        // no triangle of the unit grid fits inside this fence
        assert_eq!(inside, 0);
        assert!(overlap > 0);
        assert_eq!(overlap + outside, 32);
    }

    #[test]
    fn block_fence_inside_keeps_covered_cells() {
        let m = grid(5);
        let fence = Fence::block(BoundingBox::new(0.0, 0.0, 2.0, 2.0), FenceOption::Inside);
        let mut c = Collector::new();
        Extractor::new(&m)
            .extract(FeatureKind::Triangle, 0, Some(&fence), &mut c)
            .unwrap();
        assert_eq!(c.occurrences.len(), 8);
    }

    #[test]
    fn info_and_flow_payloads() {
        let m = grid(3);
        let mut c = Collector::new();
        Extractor::new(&m)
            .extract(FeatureKind::TriangleInfo, 0, None, &mut c)
            .unwrap();
        assert!(c.occurrences.iter().all(|o| o.points.len() == 5 && o.points[4].x == 0.0));
        let mut c = Collector::new();
        Extractor::new(&m)
            .extract(FeatureKind::FlowArrow, 0, None, &mut c)
            .unwrap();
        assert_eq!(c.occurrences.len(), 8);
        assert!(c.occurrences.iter().all(|o| o.points.len() == 2));
    }
}
