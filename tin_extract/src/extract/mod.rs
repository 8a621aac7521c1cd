//! Bulk extraction: enumerate every occurrence of one feature kind in a
//! surface model, apply the fence and push batches to a [`FeatureSink`].

mod edges;
mod features;
mod hull;
mod lattice;
mod points;
mod slope_lines;
mod triangles;

pub use lattice::extract_lattice;
pub use slope_lines::extract_slope_lines;

pub(crate) use edges::edge_pieces;
pub(crate) use features::{feature_id_points, group_spot_filter, loadable_by_id};
pub(crate) use hull::{hull_identity, hull_pieces, skirt};
pub(crate) use points::{point_selected, spot_mask};
pub(crate) use triangles::{suppressed, triangle_passes, triangle_payload};

use std::ops::Range;

use log::{debug, info};

use crate::callback::{Bridge, FeatureSink};
use crate::clip::{self, ActiveFence, ClipResult, Fence, FenceOption};
use crate::config::ExtractConfig;
use crate::error::{ExtractError, Result};
use crate::geometry::Point3;
use crate::model::{FeatureKind, SurfaceModel};
use crate::traversal::Markers;

/// Extraction entry points bound to one surface model.
pub struct Extractor<'a> {
    model: &'a SurfaceModel,
    config: ExtractConfig,
}

impl<'a> Extractor<'a> {
    pub fn new(model: &'a SurfaceModel) -> Self {
        Self::with_config(model, ExtractConfig::default())
    }

    pub fn with_config(model: &'a SurfaceModel, config: ExtractConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Loads every occurrence of `kind`, optionally restricted by `fence`.
    ///
    /// `max_spots` is the batch size for point kinds. Zero selects the
    /// configured `max_spots`; the size is then clamped to
    /// `[1, max_spots_limit]` and to the number of points in the model.
    pub fn extract(
        &self,
        kind: FeatureKind,
        max_spots: usize,
        fence: Option<&Fence>,
        sink: &mut dyn FeatureSink,
    ) -> Result<()> {
        let kind = resolve_kind(self.model, kind)?;
        let mut query = self.query(max_spots, fence, sink)?;
        info!(
            "extracting {kind:?} from {} points, fence {}",
            self.model.num_points(),
            if query.fence.is_some() { "on" } else { "off" }
        );
        match kind {
            FeatureKind::Spots
            | FeatureKind::RandomSpots
            | FeatureKind::FeatureSpot
            | FeatureKind::TinPoint => points::extract(&mut query, kind),
            FeatureKind::GroupSpots => features::group_spots(&mut query),
            FeatureKind::Breakline
            | FeatureKind::SoftBreakline
            | FeatureKind::ContourLine
            | FeatureKind::Void
            | FeatureKind::Island
            | FeatureKind::Hole
            | FeatureKind::GraphicBreak
            | FeatureKind::Hull
            | FeatureKind::Polygon
            | FeatureKind::SlopeToe
            | FeatureKind::Region => features::stored(&mut query, kind),
            FeatureKind::Triangle
            | FeatureKind::TriangleInfo
            | FeatureKind::TriangleIndex
            | FeatureKind::FlowArrow => triangles::extract(&mut query, kind),
            FeatureKind::TinLine => edges::extract(&mut query),
            FeatureKind::TinHull | FeatureKind::TriangleEdge => hull::extract(&mut query, kind),
            FeatureKind::LatticePoint
            | FeatureKind::Lattice
            | FeatureKind::LatticeEdge
            | FeatureKind::LatticeXLine
            | FeatureKind::LatticeYLine
            | FeatureKind::SlopeLine
            | FeatureKind::CheckStop => Err(ExtractError::InvalidFeatureKind(kind)),
        }?;
        debug!("{kind:?}: {} batches delivered", query.bridge.delivered());
        Ok(())
    }

    /// Loads every live feature carrying `user_tag`, whatever its kind.
    pub fn extract_by_user_tag(
        &self,
        user_tag: u64,
        max_spots: usize,
        fence: Option<&Fence>,
        sink: &mut dyn FeatureSink,
    ) -> Result<()> {
        let mut query = self.query(max_spots, fence, sink)?;
        features::by_user_tag(&mut query, user_tag)
    }

    /// Loads the feature(s) carrying `feature_id`.
    pub fn extract_by_feature_id(
        &self,
        feature_id: u64,
        fence: Option<&Fence>,
        sink: &mut dyn FeatureSink,
    ) -> Result<()> {
        let mut query = self.query(0, fence, sink)?;
        features::by_feature_id(&mut query, feature_id)
    }

    /// Loads the stored points of features that failed to link into the
    /// triangulation. No fence applies.
    pub fn extract_tin_errors(&self, sink: &mut dyn FeatureSink) -> Result<()> {
        let mut bridge = Bridge::new(sink, self.config.check_stop_interval);
        features::tin_errors(self.model, &mut bridge)
    }

    fn query<'s>(
        &self,
        max_spots: usize,
        fence: Option<&Fence>,
        sink: &'s mut dyn FeatureSink,
    ) -> Result<Query<'a, 's>> {
        let fence = clip::activate(fence, self.model.bbox())?;
        Ok(Query {
            model: self.model,
            fence,
            max_spots: self
                .config
                .bulk_batch_size(max_spots, self.model.num_points()),
            bridge: Bridge::new(sink, self.config.check_stop_interval),
        })
    }
}

/// Validates a requested kind against the model state. A hull request on a
/// triangulated model loads the triangulation hull.
pub(crate) fn resolve_kind(model: &SurfaceModel, kind: FeatureKind) -> Result<FeatureKind> {
    if kind.is_lattice() || matches!(kind, FeatureKind::SlopeLine | FeatureKind::CheckStop) {
        return Err(ExtractError::InvalidFeatureKind(kind));
    }
    let kind = if kind == FeatureKind::Hull && model.is_triangulated() {
        FeatureKind::TinHull
    } else {
        kind
    };
    if kind.requires_tin() && !model.is_triangulated() {
        return Err(ExtractError::NotTriangulated(kind));
    }
    Ok(kind)
}

/// State of one bulk extraction call.
pub(crate) struct Query<'a, 's> {
    pub(crate) model: &'a SurfaceModel,
    pub(crate) fence: Option<ActiveFence>,
    pub(crate) max_spots: usize,
    pub(crate) bridge: Bridge<'s>,
}

/// Applies the fence to one polyline occurrence.
pub(crate) fn clip_pieces(fence: Option<&ActiveFence>, points: Vec<Point3>) -> Vec<Vec<Point3>> {
    let Some(f) = fence else {
        return vec![points];
    };
    match f.clip.clip(&points, f.option) {
        ClipResult::Rejected => Vec::new(),
        ClipResult::Whole => vec![points],
        ClipResult::Split(pieces) => pieces,
    }
}

/// Fence pre-marking for one TIN query.
///
/// Points inside the fence are marked, then every neighbor of an inside
/// point. The marked region therefore holds all vertices of any triangle
/// or edge with a vertex inside the fence.
pub(crate) struct FenceMarks<'m> {
    markers: Markers<'m>,
    inside: Vec<usize>,
    range: Range<usize>,
}

impl FenceMarks<'_> {
    /// Whether `p` lies inside the fence.
    pub(crate) fn is_inside(&self, p: usize) -> bool {
        self.inside.binary_search(&p).is_ok()
    }

    /// Whether `p` is inside the fence or adjacent to an inside point.
    pub(crate) fn is_marked(&self, p: usize) -> bool {
        self.markers.is_marked(p)
    }

    /// Point index range worth visiting as the lowest vertex of a triangle
    /// or edge.
    pub(crate) fn range(&self) -> Range<usize> {
        self.range.clone()
    }
}

/// Marks the points inside the fence and their neighbors.
///
/// `whole_only` is set when only geometry lying entirely inside the fence is
/// wanted. The range is then narrowed to the marked span. Otherwise an item
/// may cross the fence without touching a marked point, so only the upper
/// end is narrowed, to the points left of the fence's right edge.
pub(crate) fn mark_inside<'m>(
    model: &'m SurfaceModel,
    fence: &ActiveFence,
    whole_only: bool,
) -> FenceMarks<'m> {
    let bbox = fence.clip.bbox();
    let tol = fence.clip.tolerance();
    let lo = model.lower_bound_x(bbox.min_x - tol);
    let hi = model.upper_bound_x(bbox.max_x + tol);
    let mut markers = Markers::new(model);
    let mut inside = Vec::new();
    for p in lo..hi {
        let q = model.point(p);
        if fence.clip.contains(q.x, q.y) {
            markers.mark(p);
            inside.push(p);
        }
    }
    for &p in &inside {
        for n in model.neighbors(p) {
            markers.mark(n);
        }
    }
    debug!(
        "{} points inside fence, {} marked with their neighbors",
        inside.len(),
        markers.len()
    );
    let range = match fence.option {
        FenceOption::Outside => 0..model.num_points(),
        FenceOption::Inside if whole_only => markers.span(),
        _ => 0..hi,
    };
    FenceMarks {
        markers,
        inside,
        range,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::Collector;
    use crate::geometry::BoundingBox;
    use crate::model::FeatureState;
    use crate::traversal::tests::grid;

    fn data_model() -> SurfaceModel {
        let mut m = SurfaceModel::new();
        m.add_points(&[
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(10.0, 0.0, 2.0),
            Point3::new(10.0, 10.0, 3.0),
            Point3::new(0.0, 10.0, 4.0),
            Point3::new(5.0, 5.0, 5.0),
        ])
        .unwrap();
        m
    }

    #[test]
    fn tin_kinds_need_a_triangulation() {
        let m = data_model();
        let mut c = Collector::new();
        let err = Extractor::new(&m)
            .extract(FeatureKind::Triangle, 0, None, &mut c)
            .unwrap_err();
        assert!(matches!(err, ExtractError::NotTriangulated(FeatureKind::Triangle)));
        let err = Extractor::new(&m)
            .extract(FeatureKind::LatticePoint, 0, None, &mut c)
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidFeatureKind(_)));
        assert!(c.occurrences.is_empty());
    }

    #[test]
    fn hull_request_on_tin_walks_the_hull() {
        let mut m = data_model();
        m.add_feature(
            FeatureKind::Hull,
            7,
            70,
            &[
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(10.0, 0.0, 2.0),
                Point3::new(10.0, 10.0, 3.0),
                Point3::new(0.0, 10.0, 4.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
        )
        .unwrap();
        m.triangulate().unwrap();
        assert_eq!(m.features()[0].state, FeatureState::Tin);
        let mut c = Collector::new();
        Extractor::new(&m)
            .extract(FeatureKind::Hull, 0, None, &mut c)
            .unwrap();
        assert_eq!(c.occurrences.len(), 1);
        let o = &c.occurrences[0];
        assert_eq!(o.kind, FeatureKind::TinHull);
        assert_eq!((o.user_tag, o.feature_id), (7, 70));
        assert_eq!(o.points.len(), 5);
    }

    #[test]
    fn marking_floods_one_hop_to_neighbors() {
        let m = grid(5);
        let fence = Fence::block(BoundingBox::new(1.5, 1.5, 2.5, 2.5), FenceOption::Inside);
        let active = clip::activate(Some(&fence), m.bbox()).unwrap().unwrap();
        let centre = m.find_point(2.0, 2.0).unwrap();
        let east = m.find_point(3.0, 2.0).unwrap();
        let far = m.find_point(0.0, 0.0).unwrap();
        {
            let marks = mark_inside(&m, &active, true);
            assert!(marks.is_inside(centre));
            // (2,2) (3,2) (3,3) reaches into the fence through the centre only
            assert!(!marks.is_inside(east));
            assert!(marks.is_marked(east));
            assert!(!marks.is_marked(far));
            assert_eq!(marks.markers.len(), m.neighbors(centre).count() + 1);
            assert!(marks.range().contains(&east));
            assert!(!marks.range().contains(&far));
        }
        assert!(!m.has_markers());
    }

    #[test]
    fn crossing_items_keep_the_lower_range() {
        let m = grid(5);
        let fence = Fence::block(BoundingBox::new(1.5, 1.5, 2.5, 2.5), FenceOption::Overlap);
        let active = clip::activate(Some(&fence), m.bbox()).unwrap().unwrap();
        let marks = mark_inside(&m, &active, false);
        assert_eq!(marks.range().start, 0);
        assert!(marks.range().end < m.num_points());
    }
}
