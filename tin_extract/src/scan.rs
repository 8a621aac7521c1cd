//! Resumable pull-style extraction.
//!
//! A [`ScanContext`] returns one occurrence per call: one point batch for
//! the point kinds, one feature (or one split piece of it) for stored
//! features, one triangle, edge or hull panel for the TIN kinds. Stepping a
//! context to exhaustion yields the same occurrences, in the same order, as
//! the bulk [`Extractor`](crate::extract::Extractor) over the same model and
//! fence.

use std::collections::VecDeque;

use log::{debug, trace};

use crate::callback::{Bridge, FeatureSink, Occurrence};
use crate::clip::{self, ActiveFence, Fence, FenceOption};
use crate::config::ExtractConfig;
use crate::error::Result;
use crate::extract::{
    clip_pieces, edge_pieces, feature_id_points, group_spot_filter, hull_identity, hull_pieces,
    loadable_by_id, point_selected, resolve_kind, skirt, spot_mask, suppressed, triangle_passes,
    triangle_payload,
};
use crate::geometry::Point3;
use crate::model::{FeatureKind, SurfaceModel, NULL_FEATURE_ID, NULL_USER_TAG};
use crate::traversal::{self, Edges, Triangles};

/// Kind specific resume position. All zero means nothing has been scanned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub sp1: usize,
    pub sp2: usize,
    pub sp3: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Kind(FeatureKind),
    UserTag(u64),
    FeatureId(u64),
}

/// Resumable extraction over one surface model.
///
/// The context owns the clip model built from its fence. It must not be
/// stepped from two threads at once.
pub struct ScanContext<'a> {
    model: &'a SurfaceModel,
    target: Target,
    fence: Option<ActiveFence>,
    max_spots: usize,
    end: usize,
    cursor: Cursor,
    pending: VecDeque<Occurrence>,
    mask: Option<Vec<bool>>,
    hull: Option<Vec<Vec<Point3>>>,
}

impl<'a> ScanContext<'a> {
    /// Scan of every occurrence of `kind`. A zero `max_spots` selects the
    /// configured scan batch size.
    pub fn new(
        model: &'a SurfaceModel,
        kind: FeatureKind,
        max_spots: usize,
        fence: Option<&Fence>,
    ) -> Result<Self> {
        Self::with_config(model, kind, max_spots, fence, &ExtractConfig::default())
    }

    pub fn with_config(
        model: &'a SurfaceModel,
        kind: FeatureKind,
        max_spots: usize,
        fence: Option<&Fence>,
        config: &ExtractConfig,
    ) -> Result<Self> {
        let kind = resolve_kind(model, kind)?;
        let mut scan = Self::build(model, Target::Kind(kind), fence, config.scan_batch_size(max_spots))?;
        scan.mask = spot_mask(model, kind);
        debug!("scan context for {kind:?} ready, batch size {}", scan.max_spots);
        Ok(scan)
    }

    /// Scan of every live feature carrying `user_tag`, whatever its kind.
    /// Group spots are returned in batches of `max_spots`.
    pub fn for_user_tag(
        model: &'a SurfaceModel,
        user_tag: u64,
        max_spots: usize,
        fence: Option<&Fence>,
    ) -> Result<Self> {
        let batch = ExtractConfig::default().scan_batch_size(max_spots);
        Self::build(model, Target::UserTag(user_tag), fence, batch)
    }

    /// Scan of the features carrying `feature_id`.
    pub fn for_feature_id(
        model: &'a SurfaceModel,
        feature_id: u64,
        fence: Option<&Fence>,
    ) -> Result<Self> {
        Self::build(model, Target::FeatureId(feature_id), fence, 1)
    }

    fn build(
        model: &'a SurfaceModel,
        target: Target,
        fence: Option<&Fence>,
        max_spots: usize,
    ) -> Result<Self> {
        let fence = clip::activate(fence, model.bbox())?;
        let end = match &fence {
            Some(f) if f.option != FenceOption::Outside => {
                model.upper_bound_x(f.clip.bbox().max_x + f.clip.tolerance())
            }
            _ => model.num_points(),
        };
        Ok(Self {
            model,
            target,
            fence,
            max_spots: max_spots.max(1),
            end,
            cursor: Cursor::default(),
            pending: VecDeque::new(),
            mask: None,
            hull: None,
        })
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Number of split pieces waiting to be returned.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Returns the next occurrence, or `None` once the enumeration is
    /// exhausted. Exhaustion resets the context, so the following call
    /// starts over.
    pub fn next_occurrence(&mut self) -> Option<Occurrence> {
        if let Some(piece) = self.pending.pop_front() {
            return Some(piece);
        }
        let found = match self.target {
            Target::UserTag(tag) => self.step_user_tag(tag),
            Target::FeatureId(id) => self.step_feature_id(id),
            Target::Kind(kind) => match kind {
                FeatureKind::Spots
                | FeatureKind::RandomSpots
                | FeatureKind::FeatureSpot
                | FeatureKind::TinPoint => self.step_points(kind),
                FeatureKind::GroupSpots => self.step_group_spots(),
                FeatureKind::Triangle
                | FeatureKind::TriangleInfo
                | FeatureKind::TriangleIndex
                | FeatureKind::FlowArrow => self.step_triangles(kind),
                FeatureKind::TinLine => self.step_edges(),
                FeatureKind::TinHull => self.step_hull(),
                FeatureKind::TriangleEdge => self.step_hull_panels(),
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
                | FeatureKind::Region => self.step_stored(kind),
                // rejected when the context was created
                FeatureKind::LatticePoint
                | FeatureKind::Lattice
                | FeatureKind::LatticeEdge
                | FeatureKind::LatticeXLine
                | FeatureKind::LatticeYLine
                | FeatureKind::SlopeLine
                | FeatureKind::CheckStop => None,
            },
        };
        if found.is_none() {
            trace!("scan of {:?} exhausted", self.target);
            self.reset();
        }
        found
    }

    /// Steps the context to exhaustion, delivering every occurrence to
    /// `sink`. Returns the number of occurrences delivered.
    pub fn run(&mut self, sink: &mut dyn FeatureSink) -> Result<usize> {
        let mut bridge = Bridge::new(sink, None);
        while let Some(o) = self.next_occurrence() {
            bridge.deliver(o.kind, o.user_tag, o.feature_id, &o.points)?;
        }
        Ok(bridge.delivered())
    }

    fn reset(&mut self) {
        self.cursor = Cursor::default();
        self.pending.clear();
        self.hull = None;
    }

    fn inside(&self, p: usize) -> bool {
        let q = self.model.point(p);
        self.fence
            .as_ref()
            .is_some_and(|f| f.clip.contains(q.x, q.y))
    }

    /// Returns the first piece and queues the rest.
    fn queue(
        &mut self,
        kind: FeatureKind,
        user_tag: u64,
        feature_id: u64,
        pieces: Vec<Vec<Point3>>,
    ) -> Option<Occurrence> {
        let mut pieces = pieces
            .into_iter()
            .filter(|p| !p.is_empty())
            .map(|points| Occurrence {
                kind,
                user_tag,
                feature_id,
                points,
            });
        let first = pieces.next()?;
        self.pending.extend(pieces);
        Some(first)
    }

    fn step_points(&mut self, kind: FeatureKind) -> Option<Occurrence> {
        let model = self.model;
        let mut points = Vec::new();
        let mut p = self.cursor.sp1;
        while p < model.num_points() && points.len() < self.max_spots {
            let q = model.point(p);
            let passes = self
                .fence
                .as_ref()
                .map_or(true, |f| f.clip.point_passes(q, f.option));
            if passes && point_selected(model, kind, p, self.mask.as_deref()) {
                points.push(q);
            }
            p += 1;
        }
        self.cursor.sp1 = p;
        (!points.is_empty()).then_some(Occurrence {
            kind,
            user_tag: NULL_USER_TAG,
            feature_id: NULL_FEATURE_ID,
            points,
        })
    }

    /// Next batch of the group spot feature at `index`. The cursor moves past
    /// the feature once its last batch has been returned.
    fn next_group_batch(&mut self, index: usize) -> Option<Occurrence> {
        let model = self.model;
        let feature = model.feature(index)?;
        let points = group_spot_filter(self.fence.as_ref(), model.feature_points(index));
        let start = self.cursor.sp2;
        if start >= points.len() {
            self.cursor.sp1 += 1;
            self.cursor.sp2 = 0;
            return None;
        }
        let end = (start + self.max_spots).min(points.len());
        if end == points.len() {
            self.cursor.sp1 += 1;
            self.cursor.sp2 = 0;
        } else {
            self.cursor.sp2 = end;
        }
        Some(Occurrence {
            kind: feature.kind,
            user_tag: feature.user_tag,
            feature_id: feature.feature_id,
            points: points[start..end].to_vec(),
        })
    }

    fn step_group_spots(&mut self) -> Option<Occurrence> {
        let model = self.model;
        while let Some(feature) = model.feature(self.cursor.sp1) {
            if feature.kind != FeatureKind::GroupSpots || !feature.state.is_live() {
                self.cursor.sp1 += 1;
                self.cursor.sp2 = 0;
                continue;
            }
            if let Some(o) = self.next_group_batch(self.cursor.sp1) {
                return Some(o);
            }
        }
        None
    }

    fn step_user_tag(&mut self, user_tag: u64) -> Option<Occurrence> {
        let model = self.model;
        while let Some(feature) = model.feature(self.cursor.sp1) {
            let index = self.cursor.sp1;
            if feature.user_tag != user_tag || !feature.state.is_live() {
                self.cursor.sp1 += 1;
                self.cursor.sp2 = 0;
                continue;
            }
            if feature.kind == FeatureKind::GroupSpots {
                if let Some(o) = self.next_group_batch(index) {
                    return Some(o);
                }
                continue;
            }
            self.cursor.sp1 += 1;
            let pieces = clip_pieces(self.fence.as_ref(), model.feature_points(index));
            if let Some(o) = self.queue(feature.kind, feature.user_tag, feature.feature_id, pieces) {
                return Some(o);
            }
        }
        None
    }

    fn step_stored(&mut self, kind: FeatureKind) -> Option<Occurrence> {
        let model = self.model;
        while let Some(feature) = model.feature(self.cursor.sp1) {
            let index = self.cursor.sp1;
            self.cursor.sp1 += 1;
            if feature.kind != kind || !feature.state.is_live() {
                continue;
            }
            let pieces = clip_pieces(self.fence.as_ref(), model.feature_points(index));
            if let Some(o) = self.queue(feature.kind, feature.user_tag, feature.feature_id, pieces) {
                return Some(o);
            }
        }
        None
    }

    fn step_feature_id(&mut self, feature_id: u64) -> Option<Occurrence> {
        let model = self.model;
        while let Some(feature) = model.feature(self.cursor.sp1) {
            let index = self.cursor.sp1;
            self.cursor.sp1 += 1;
            if feature.feature_id != feature_id || !loadable_by_id(feature.state) {
                continue;
            }
            let points = feature_id_points(model, index, feature);
            let pieces = clip_pieces(self.fence.as_ref(), points);
            if let Some(o) = self.queue(feature.kind, feature.user_tag, feature.feature_id, pieces) {
                return Some(o);
            }
        }
        None
    }

    fn step_triangles(&mut self, kind: FeatureKind) -> Option<Occurrence> {
        let model = self.model;
        let triangles = if self.cursor.sp3 == 0 {
            traversal::triangles(model)
        } else {
            Triangles::resume(model, self.cursor.sp1, self.cursor.sp2)
        };
        for t in triangles {
            if t[0] >= self.end {
                break;
            }
            self.cursor = Cursor {
                sp1: t[0],
                sp2: t[1],
                sp3: 1,
            };
            if suppressed(model, kind, t) {
                continue;
            }
            if let Some(f) = &self.fence {
                let inside = t.map(|p| self.inside(p));
                if !triangle_passes(model, f, t, inside) {
                    continue;
                }
            }
            return Some(Occurrence {
                kind,
                user_tag: NULL_USER_TAG,
                feature_id: NULL_FEATURE_ID,
                points: triangle_payload(model, kind, t),
            });
        }
        None
    }

    fn step_edges(&mut self) -> Option<Occurrence> {
        let model = self.model;
        let edges = if self.cursor.sp3 == 0 {
            traversal::edges(model)
        } else {
            Edges::resume(model, self.cursor.sp1, self.cursor.sp2)
        };
        for (a, b) in edges {
            if a >= self.end {
                break;
            }
            self.cursor = Cursor {
                sp1: a,
                sp2: b,
                sp3: 1,
            };
            if model.has_voids() && traversal::edge_is_void(model, a, b) {
                continue;
            }
            let inside = [self.inside(a), self.inside(b)];
            let pieces = edge_pieces(model, self.fence.as_ref(), a, b, inside);
            if let Some(o) = self.queue(FeatureKind::TinLine, NULL_USER_TAG, NULL_FEATURE_ID, pieces) {
                return Some(o);
            }
        }
        None
    }

    fn step_hull(&mut self) -> Option<Occurrence> {
        if self.cursor.sp1 != 0 {
            return None;
        }
        self.cursor.sp1 = 1;
        let pieces = hull_pieces(self.model, self.fence.as_ref());
        let (tag, id) = hull_identity(self.model);
        self.queue(FeatureKind::TinHull, tag, id, pieces)
    }

    fn step_hull_panels(&mut self) -> Option<Occurrence> {
        if self.hull.is_none() {
            self.hull = Some(hull_pieces(self.model, self.fence.as_ref()));
        }
        let pieces = self.hull.as_ref()?;
        let z_min = self.model.z_min();
        loop {
            let piece = pieces.get(self.cursor.sp1)?;
            let i = self.cursor.sp2;
            if i + 1 < piece.len() {
                self.cursor.sp2 += 1;
                return Some(Occurrence {
                    kind: FeatureKind::TriangleEdge,
                    user_tag: NULL_USER_TAG,
                    feature_id: NULL_FEATURE_ID,
                    points: skirt(piece[i], piece[i + 1], z_min).to_vec(),
                });
            }
            self.cursor.sp1 += 1;
            self.cursor.sp2 = 0;
        }
    }
}

impl Iterator for ScanContext<'_> {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        self.next_occurrence()
    }
}
