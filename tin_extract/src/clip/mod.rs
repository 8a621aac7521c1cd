//! Fence handling: validation, the clip model built from the fence polygon,
//! point containment and polyline/polygon clipping.

mod fence;

pub use fence::{Fence, FenceOption, FenceType};

use log::debug;

use crate::error::{ExtractError, Result};
use crate::geometry::{
    lerp, point_in_triangle, segment_intersection, BoundingBox, Point, Point3,
};
use crate::model::SurfaceModel;
use crate::traversal;

/// Outcome of clipping one point sequence against a fence.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipResult {
    /// Nothing of the input satisfies the fence option.
    Rejected,
    /// The input satisfies the fence option as it is.
    Whole,
    /// Disjoint pieces of the input that satisfy the fence option. Pieces of
    /// a closed polygon are open runs along its outline; no fence boundary
    /// is added to close them.
    Split(Vec<Vec<Point3>>),
}

/// Auxiliary triangulation of a fence used for containment queries.
#[derive(Debug, Clone)]
pub struct ClipModel {
    surface: SurfaceModel,
    fence_type: FenceType,
    bbox: BoundingBox,
    boundary: Vec<Point>,
    triangles: Vec<[Point; 3]>,
    tolerance: f64,
}

impl ClipModel {
    /// Triangulates the fence polygon. A block fence is triangulated from its
    /// bounding rectangle.
    pub fn build(fence: &Fence) -> Result<Self> {
        let bbox = fence
            .bbox()
            .ok_or_else(|| ExtractError::ClipModel("fence has no points".into()))?;
        let mut boundary: Vec<Point> = match fence.fence_type {
            FenceType::Block => bbox.corners().to_vec(),
            FenceType::Shape => fence.points.iter().map(|p| p.xy()).collect(),
        };
        boundary.dedup();
        if boundary.len() > 1 && boundary.first() == boundary.last() {
            boundary.pop();
        }
        if boundary.len() < 3 {
            return Err(ExtractError::ClipModel(
                "fence has fewer than three distinct points".into(),
            ));
        }

        let coords: Vec<(f64, f64)> = boundary.iter().map(|p| (p.x, p.y)).collect();
        let mut contour: Vec<usize> = (0..boundary.len()).collect();
        contour.push(0);
        let tris = cdt::triangulate_contours(&coords, &[contour])
            .map_err(|e| ExtractError::ClipModel(format!("{e:?}")))?;
        let vertices: Vec<Point3> = boundary.iter().map(|p| Point3::new(p.x, p.y, 0.0)).collect();
        let faces: Vec<[usize; 3]> = tris.into_iter().map(|t| [t.0, t.1, t.2]).collect();
        let surface = SurfaceModel::from_triangles(vertices, &faces)
            .map_err(|e| ExtractError::ClipModel(e.to_string()))?;
        let triangles: Vec<[Point; 3]> = traversal::triangles(&surface)
            .map(|t| {
                [
                    surface.point(t[0]).xy(),
                    surface.point(t[1]).xy(),
                    surface.point(t[2]).xy(),
                ]
            })
            .collect();
        if triangles.is_empty() {
            return Err(ExtractError::ClipModel("fence encloses no area".into()));
        }
        let size = (bbox.max_x - bbox.min_x).max(bbox.max_y - bbox.min_y).max(1.0);
        debug!(
            "clip model built: {:?} fence, {} boundary points, {} triangles",
            fence.fence_type,
            boundary.len(),
            triangles.len()
        );
        Ok(Self {
            surface,
            fence_type: fence.fence_type,
            bbox,
            boundary,
            triangles,
            tolerance: size * 1e-9,
        })
    }

    pub fn fence_type(&self) -> FenceType {
        self.fence_type
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Slack applied to the bounding rectangle test.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// The fence triangulation.
    pub fn surface(&self) -> &SurfaceModel {
        &self.surface
    }

    /// First fence vertex, used to detect a fence lying inside a triangle.
    pub fn anchor(&self) -> Point {
        self.boundary[0]
    }

    /// Containment test. The fence boundary counts as inside.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let t = self.tolerance;
        if x < self.bbox.min_x - t
            || x > self.bbox.max_x + t
            || y < self.bbox.min_y - t
            || y > self.bbox.max_y + t
        {
            return false;
        }
        match self.fence_type {
            FenceType::Block => true,
            FenceType::Shape => {
                let p = Point::new(x, y);
                self.triangles
                    .iter()
                    .any(|tri| point_in_triangle(p, tri[0], tri[1], tri[2], 1e-9))
            }
        }
    }

    /// Whether a single point is loaded under `option`.
    pub fn point_passes(&self, p: Point3, option: FenceOption) -> bool {
        let inside = self.contains(p.x, p.y);
        match option {
            FenceOption::Inside | FenceOption::Overlap => inside,
            FenceOption::Outside => !inside,
        }
    }

    /// Clips a polyline (or closed polygon when the last point repeats the
    /// first) against the fence.
    ///
    /// Every piece lies on the input geometry, so a split area feature comes
    /// back as the runs of its boundary on the wanted side of the fence.
    pub fn clip(&self, points: &[Point3], option: FenceOption) -> ClipResult {
        let mut pts: Vec<Point3> = Vec::with_capacity(points.len());
        for p in points {
            if pts.last().map_or(true, |q: &Point3| !q.same_xy(p)) {
                pts.push(*p);
            }
        }
        match pts.len() {
            0 => return ClipResult::Rejected,
            1 => {
                return if self.point_passes(pts[0], option) {
                    ClipResult::Whole
                } else {
                    ClipResult::Rejected
                }
            }
            _ => {}
        }
        let closed = pts.len() > 2 && pts[0].same_xy(&pts[pts.len() - 1]);

        let pieces = self.classify(&pts);
        let any_in = pieces.iter().any(|s| s.inside);
        let any_out = pieces.iter().any(|s| !s.inside);
        match (option, any_in, any_out) {
            (_, false, false) => ClipResult::Rejected,
            (FenceOption::Overlap, true, _) => ClipResult::Whole,
            (FenceOption::Inside, true, false) | (FenceOption::Outside, false, true) => {
                ClipResult::Whole
            }
            (FenceOption::Inside, true, true) => ClipResult::Split(runs(&pieces, true, closed)),
            (FenceOption::Outside, true, true) => ClipResult::Split(runs(&pieces, false, closed)),
            _ => ClipResult::Rejected,
        }
    }

    /// Splits every segment at its fence crossings and classifies each
    /// sub-segment by its midpoint.
    fn classify(&self, pts: &[Point3]) -> Vec<SubSegment> {
        let n = self.boundary.len();
        let mut out = Vec::new();
        for w in pts.windows(2) {
            let (a, b) = (w[0], w[1]);
            let mut ts = vec![0.0, 1.0];
            for i in 0..n {
                let (c, d) = (self.boundary[i], self.boundary[(i + 1) % n]);
                if let Some((t, _)) = segment_intersection(a.xy(), b.xy(), c, d) {
                    if t > 0.0 && t < 1.0 {
                        ts.push(t);
                    }
                }
            }
            ts.sort_by(f64::total_cmp);
            ts.dedup_by(|x, y| (*x - *y).abs() < 1e-12);
            for tw in ts.windows(2) {
                let start = lerp(a, b, tw[0]);
                let end = lerp(a, b, tw[1]);
                let mid = lerp(a, b, (tw[0] + tw[1]) / 2.0);
                out.push(SubSegment {
                    start,
                    end,
                    inside: self.contains(mid.x, mid.y),
                });
            }
        }
        out
    }
}

struct SubSegment {
    start: Point3,
    end: Point3,
    inside: bool,
}

/// Joins consecutive sub-segments on the wanted side into polylines. For a
/// closed input the run wrapping past the start is joined into one piece.
fn runs(pieces: &[SubSegment], inside: bool, closed: bool) -> Vec<Vec<Point3>> {
    let mut out: Vec<Vec<Point3>> = Vec::new();
    let mut current: Vec<Point3> = Vec::new();
    for s in pieces {
        if s.inside == inside {
            if current.is_empty() {
                current.push(s.start);
            }
            current.push(s.end);
        } else if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    let wraps = closed
        && out.len() > 1
        && pieces.first().is_some_and(|s| s.inside == inside)
        && pieces.last().is_some_and(|s| s.inside == inside);
    if wraps {
        let first = out.remove(0);
        if let Some(last) = out.last_mut() {
            last.extend_from_slice(&first[1..]);
        }
    }
    out
}

/// Validated fence ready for use by an extraction.
#[derive(Debug, Clone)]
pub struct ActiveFence {
    pub clip: ClipModel,
    pub option: FenceOption,
}

/// Validates `fence` against the model extent and builds its clip model.
///
/// Fences with fewer than three points or that are not closed are disabled.
/// A block fence covering the whole model is disabled unless it keeps only
/// what lies outside.
pub fn activate(fence: Option<&Fence>, extent: Option<BoundingBox>) -> Result<Option<ActiveFence>> {
    let Some(fence) = fence else {
        return Ok(None);
    };
    if !fence.is_valid() {
        debug!("fence with {} points is not closed, ignoring it", fence.points.len());
        return Ok(None);
    }
    let clip = ClipModel::build(fence)?;
    if fence.fence_type == FenceType::Block && fence.option != FenceOption::Outside {
        if let Some(extent) = extent {
            if clip.bbox().contains_box(&extent) {
                debug!("block fence covers the whole model, ignoring it");
                return Ok(None);
            }
        }
    }
    Ok(Some(ActiveFence {
        clip,
        option: fence.option,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l_shape() -> Fence {
        Fence::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(10.0, 0.0, 0.0),
                Point3::new(10.0, 4.0, 0.0),
                Point3::new(4.0, 4.0, 0.0),
                Point3::new(4.0, 10.0, 0.0),
                Point3::new(0.0, 10.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
            ],
            FenceType::Shape,
            FenceOption::Inside,
        )
    }

    #[test]
    fn shape_containment_respects_concavity() {
        let clip = ClipModel::build(&l_shape()).unwrap();
        assert!(clip.contains(2.0, 8.0));
        assert!(clip.contains(8.0, 2.0));
        assert!(!clip.contains(8.0, 8.0));
        // boundary is inside
        assert!(clip.contains(10.0, 2.0));
    }

    #[test]
    fn block_uses_bounding_rectangle() {
        let mut f = l_shape();
        f.fence_type = FenceType::Block;
        let clip = ClipModel::build(&f).unwrap();
        assert!(clip.contains(8.0, 8.0));
    }

    #[test]
    fn line_crossing_is_split_with_interpolated_z() {
        let clip = ClipModel::build(&l_shape()).unwrap();
        let line = [Point3::new(-5.0, 2.0, 0.0), Point3::new(15.0, 2.0, 20.0)];
        match clip.clip(&line, FenceOption::Inside) {
            ClipResult::Split(pieces) => {
                assert_eq!(pieces.len(), 1);
                let p = &pieces[0];
                assert_eq!(p.len(), 2);
                assert!((p[0].x - 0.0).abs() < 1e-9);
                assert!((p[0].z - 5.0).abs() < 1e-9);
                assert!((p[1].x - 10.0).abs() < 1e-9);
                assert!((p[1].z - 15.0).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
        match clip.clip(&line, FenceOption::Outside) {
            ClipResult::Split(pieces) => assert_eq!(pieces.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(clip.clip(&line, FenceOption::Overlap), ClipResult::Whole);
    }

    #[test]
    fn line_through_notch_leaves_two_inside_pieces() {
        let clip = ClipModel::build(&l_shape()).unwrap();
        // crosses the vertical arm, the notch, then the horizontal arm
        let line = [Point3::new(1.0, 12.0, 0.0), Point3::new(12.0, 1.0, 0.0)];
        match clip.clip(&line, FenceOption::Inside) {
            ClipResult::Split(pieces) => {
                assert_eq!(pieces.len(), 2);
                for piece in &pieces {
                    for p in piece {
                        assert!(clip.contains(p.x, p.y));
                    }
                }
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn closed_polygon_wrap_is_joined() {
        let clip = ClipModel::build(&Fence::block(
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            FenceOption::Outside,
        ))
        .unwrap();
        // square starting outside on the left, crossing the fence edge x = 0
        let poly = [
            Point3::new(-4.0, 4.0, 0.0),
            Point3::new(4.0, 4.0, 0.0),
            Point3::new(4.0, 6.0, 0.0),
            Point3::new(-4.0, 6.0, 0.0),
            Point3::new(-4.0, 4.0, 0.0),
        ];
        match clip.clip(&poly, FenceOption::Outside) {
            ClipResult::Split(pieces) => {
                assert_eq!(pieces.len(), 1);
                assert_eq!(pieces[0].len(), 4);
                assert!((pieces[0][0].x - 0.0).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        let clip = ClipModel::build(&l_shape()).unwrap();
        assert_eq!(clip.clip(&[], FenceOption::Inside), ClipResult::Rejected);
        assert_eq!(
            clip.clip(&[Point3::new(20.0, 20.0, 0.0)], FenceOption::Inside),
            ClipResult::Rejected
        );
        let far = [Point3::new(20.0, 20.0, 0.0), Point3::new(30.0, 20.0, 0.0)];
        assert_eq!(clip.clip(&far, FenceOption::Inside), ClipResult::Rejected);
        assert_eq!(clip.clip(&far, FenceOption::Outside), ClipResult::Whole);
    }

    #[test]
    fn activation_rules() {
        let extent = Some(BoundingBox::new(1.0, 1.0, 2.0, 2.0));
        let open = Fence::new(
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)],
            FenceType::Shape,
            FenceOption::Inside,
        );
        assert!(activate(Some(&open), extent).unwrap().is_none());
        let cover = Fence::block(BoundingBox::new(0.0, 0.0, 5.0, 5.0), FenceOption::Inside);
        assert!(activate(Some(&cover), extent).unwrap().is_none());
        let outside = Fence::block(BoundingBox::new(0.0, 0.0, 5.0, 5.0), FenceOption::Outside);
        assert!(activate(Some(&outside), extent).unwrap().is_some());
        assert!(activate(None, extent).unwrap().is_none());
    }

    #[test]
    fn zero_area_fence_is_a_hard_error() {
        let flat = Fence::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(2.0, 2.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
            ],
            FenceType::Shape,
            FenceOption::Inside,
        );
        assert!(matches!(
            activate(Some(&flat), None),
            Err(ExtractError::ClipModel(_))
        ));
    }

    #[test]
    fn split_area_comes_back_as_boundary_runs() {
        let clip = ClipModel::build(&Fence::block(
            BoundingBox::new(5.0, -5.0, 15.0, 15.0),
            FenceOption::Inside,
        ))
        .unwrap();
        let square = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(10.0, 10.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
        ];
        let on_outline = |p: &Point3| {
            p.x.abs() < 1e-9
                || (p.x - 10.0).abs() < 1e-9
                || p.y.abs() < 1e-9
                || (p.y - 10.0).abs() < 1e-9
        };
        // both runs start where the outline crosses x = 5
        for option in [FenceOption::Inside, FenceOption::Outside] {
            match clip.clip(&square, option) {
                ClipResult::Split(pieces) => {
                    assert_eq!(pieces.len(), 1);
                    let run = &pieces[0];
                    assert_eq!(run.len(), 4);
                    assert!(!run[0].same_xy(&run[3]));
                    assert!((run[0].x - 5.0).abs() < 1e-9);
                    assert!(run.iter().all(on_outline));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
