//! In-memory surface model: the dense point array, the pooled neighbor lists
//! of a triangulated model, and the feature table.
//!
//! Connectivity is held in index-addressed arenas. Each point owns the head
//! of a singly linked list of neighbor cells (counter-clockwise order), a hull
//! successor (clockwise, only set on hull points) and the head of its feature
//! cell list. `NULL_POINT` and `NULL_CELL` mark absent links.

mod build;
mod feature;

use std::cell::Cell;

pub use feature::{
    Feature, FeatureKind, FeaturePoints, FeatureState, NULL_FEATURE_ID, NULL_USER_TAG,
};

use crate::geometry::{barycentric, point_in_polygon, BoundingBox, Point, Point3};

pub const NULL_POINT: usize = usize::MAX;
pub const NULL_CELL: usize = usize::MAX;

/// Point lies strictly inside a void region.
pub const VOID_POINT: u8 = 0b01;
/// Point lies on the boundary of a void, hole or island.
pub const VOID_BOUNDARY: u8 = 0b10;

/// Whether the model has been triangulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ModelMode {
    Data,
    Tin,
}

#[derive(Debug, Clone, Copy)]
struct ListCell {
    point: usize,
    next: usize,
}

#[derive(Debug, Clone, Copy)]
struct FeatureCell {
    feature: usize,
    next_point: usize,
    next: usize,
}

#[derive(Debug, Clone)]
struct Node {
    neighbors: usize,
    hull_next: usize,
    features: usize,
    marked: Cell<bool>,
    void_bits: u8,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            neighbors: NULL_CELL,
            hull_next: NULL_POINT,
            features: NULL_CELL,
            marked: Cell::new(false),
            void_bits: 0,
        }
    }
}

/// Terrain surface made of points, optional triangulation and features.
///
/// The scratch marker on each node uses interior mutability so fenced
/// extractions can flag candidate points through a shared reference. The
/// model is therefore not `Sync`: concurrent scans of one model must be
/// serialized by the caller.
#[derive(Debug, Clone)]
pub struct SurfaceModel {
    mode: ModelMode,
    points: Vec<Point3>,
    nodes: Vec<Node>,
    cells: Vec<ListCell>,
    feature_cells: Vec<FeatureCell>,
    features: Vec<Feature>,
    hull_point: usize,
    has_voids: bool,
}

impl Default for SurfaceModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceModel {
    /// Creates an empty untriangulated model.
    pub fn new() -> Self {
        Self {
            mode: ModelMode::Data,
            points: Vec::new(),
            nodes: Vec::new(),
            cells: Vec::new(),
            feature_cells: Vec::new(),
            features: Vec::new(),
            hull_point: NULL_POINT,
            has_voids: false,
        }
    }

    /// Creates an untriangulated model holding `points` in the given order.
    pub fn from_points(points: Vec<Point3>) -> Self {
        Self {
            points,
            ..Self::new()
        }
    }

    pub fn mode(&self) -> ModelMode {
        self.mode
    }

    pub fn is_triangulated(&self) -> bool {
        self.mode == ModelMode::Tin
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn point(&self, index: usize) -> Point3 {
        self.points[index]
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.points)
    }

    /// Lowest elevation of the model, `0.0` when empty.
    pub fn z_min(&self) -> f64 {
        self.points
            .iter()
            .map(|p| p.z)
            .fold(None, |acc: Option<f64>, z| Some(acc.map_or(z, |m| m.min(z))))
            .unwrap_or(0.0)
    }

    /// Designated starting point for hull walks.
    pub fn hull_point(&self) -> Option<usize> {
        (self.hull_point != NULL_POINT).then_some(self.hull_point)
    }

    /// Clockwise hull successor of `p`, or `NULL_POINT` for interior points.
    pub fn hull_next(&self, p: usize) -> usize {
        self.nodes.get(p).map_or(NULL_POINT, |n| n.hull_next)
    }

    /// Neighbors of `p` in counter-clockwise order.
    pub fn neighbors(&self, p: usize) -> Neighbors<'_> {
        let cell = self.nodes.get(p).map_or(NULL_CELL, |n| n.neighbors);
        Neighbors { model: self, cell }
    }

    pub fn has_neighbors(&self, p: usize) -> bool {
        self.nodes.get(p).is_some_and(|n| n.neighbors != NULL_CELL)
    }

    /// Returns `true` if `p` is linked into at least one feature chain.
    pub fn is_on_feature(&self, p: usize) -> bool {
        self.nodes.get(p).is_some_and(|n| n.features != NULL_CELL)
    }

    pub fn void_bits(&self, p: usize) -> u8 {
        self.nodes.get(p).map_or(0, |n| n.void_bits)
    }

    pub fn is_void_point(&self, p: usize) -> bool {
        self.void_bits(p) & VOID_POINT != 0
    }

    pub fn is_void_boundary(&self, p: usize) -> bool {
        self.void_bits(p) & VOID_BOUNDARY != 0
    }

    /// `true` only when the triangulated model carries void regions.
    pub fn has_voids(&self) -> bool {
        self.has_voids
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    /// Point indices of a feature in chain order. A closed chain repeats its
    /// first index at the end. Stored (error) features have no indices.
    pub fn feature_point_indices(&self, index: usize) -> Vec<usize> {
        let Some(feature) = self.features.get(index) else {
            return Vec::new();
        };
        match &feature.points {
            FeaturePoints::Range { first, count } => (*first..first + count).collect(),
            FeaturePoints::Offsets(offsets) => offsets.clone(),
            FeaturePoints::Stored(_) => Vec::new(),
            FeaturePoints::Chain { head } => {
                let mut out = vec![*head];
                let mut p = *head;
                while out.len() <= self.points.len() {
                    let next = self.next_feature_point(index, p);
                    if next == NULL_POINT {
                        break;
                    }
                    out.push(next);
                    if next == *head {
                        break;
                    }
                    p = next;
                }
                out
            }
        }
    }

    /// Coordinates of a feature, see [`SurfaceModel::feature_point_indices`].
    pub fn feature_points(&self, index: usize) -> Vec<Point3> {
        match self.features.get(index).map(|f| &f.points) {
            Some(FeaturePoints::Stored(points)) => points.clone(),
            Some(_) => self
                .feature_point_indices(index)
                .into_iter()
                .map(|p| self.points[p])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Next point along feature `feature` after `p`, or `NULL_POINT`.
    pub fn next_feature_point(&self, feature: usize, p: usize) -> usize {
        let mut cell = self.nodes.get(p).map_or(NULL_CELL, |n| n.features);
        while cell != NULL_CELL {
            let fc = self.feature_cells[cell];
            if fc.feature == feature {
                return fc.next_point;
            }
            cell = fc.next;
        }
        NULL_POINT
    }

    /// Returns `true` if `a-b` is a segment of a void, hole or island chain.
    pub fn is_void_segment(&self, a: usize, b: usize) -> bool {
        let linked = |from: usize, to: usize| {
            let mut cell = self.nodes.get(from).map_or(NULL_CELL, |n| n.features);
            while cell != NULL_CELL {
                let fc = self.feature_cells[cell];
                if fc.next_point == to && is_void_kind(self.features[fc.feature].kind) {
                    return true;
                }
                cell = fc.next;
            }
            false
        };
        linked(a, b) || linked(b, a)
    }

    /// Void-membership query: inside a void or hole polygon and not inside an
    /// island polygon.
    pub fn in_void_region(&self, p: Point) -> bool {
        let mut in_void = false;
        for (i, f) in self.features.iter().enumerate() {
            if !f.state.is_live() || !matches!(f.kind, FeatureKind::Void | FeatureKind::Hole) {
                continue;
            }
            if point_in_polygon(p, &self.feature_polygon(i)) {
                in_void = true;
                break;
            }
        }
        if !in_void {
            return false;
        }
        !self.features.iter().enumerate().any(|(i, f)| {
            f.state.is_live()
                && f.kind == FeatureKind::Island
                && point_in_polygon(p, &self.feature_polygon(i))
        })
    }

    fn feature_polygon(&self, index: usize) -> Vec<Point> {
        self.feature_points(index)
            .into_iter()
            .map(Point::from)
            .collect()
    }

    /// Locates the triangle containing `(x, y)`, boundary inclusive.
    pub fn locate(&self, x: f64, y: f64) -> Option<[usize; 3]> {
        if !self.is_triangulated() || !self.bbox()?.contains(x, y) {
            return None;
        }
        let p = Point::new(x, y);
        crate::traversal::triangles(self).find(|t| {
            crate::geometry::point_in_triangle(
                p,
                self.points[t[0]].xy(),
                self.points[t[1]].xy(),
                self.points[t[2]].xy(),
                1e-9,
            )
        })
    }

    /// Interpolated surface elevation at `(x, y)`.
    pub fn elevation_at(&self, x: f64, y: f64) -> Option<f64> {
        let [a, b, c] = self.locate(x, y)?;
        let (pa, pb, pc) = (self.points[a], self.points[b], self.points[c]);
        let (u, v, w) = barycentric(Point::new(x, y), pa, pb, pc)?;
        Some(u * pa.z + v * pb.z + w * pc.z)
    }

    /// Index of the point at exactly `(x, y)` using the x ordering of a
    /// triangulated model.
    pub fn find_point(&self, x: f64, y: f64) -> Option<usize> {
        if self.is_triangulated() {
            let start = self.points.partition_point(|p| p.x < x);
            self.points[start..]
                .iter()
                .take_while(|p| p.x == x)
                .position(|p| p.y == y)
                .map(|i| start + i)
        } else {
            self.points.iter().position(|p| p.x == x && p.y == y)
        }
    }

    /// First index whose x is not less than `x` (x ordered models only).
    pub fn lower_bound_x(&self, x: f64) -> usize {
        self.points.partition_point(|p| p.x < x)
    }

    /// First index whose x is greater than `x` (x ordered models only).
    pub fn upper_bound_x(&self, x: f64) -> usize {
        self.points.partition_point(|p| p.x <= x)
    }

    pub(crate) fn set_marker(&self, p: usize) -> bool {
        match self.nodes.get(p) {
            Some(n) if !n.marked.get() => {
                n.marked.set(true);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn is_marked(&self, p: usize) -> bool {
        self.nodes.get(p).is_some_and(|n| n.marked.get())
    }

    pub(crate) fn clear_marker(&self, p: usize) {
        if let Some(n) = self.nodes.get(p) {
            n.marked.set(false);
        }
    }

    /// Returns `true` if any scratch marker is set.
    pub fn has_markers(&self) -> bool {
        self.nodes.iter().any(|n| n.marked.get())
    }
}

fn is_void_kind(kind: FeatureKind) -> bool {
    matches!(
        kind,
        FeatureKind::Void | FeatureKind::Hole | FeatureKind::Island
    )
}

/// Iterator over the neighbor cycle of one point.
pub struct Neighbors<'a> {
    model: &'a SurfaceModel,
    cell: usize,
}

impl Iterator for Neighbors<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.cell == NULL_CELL {
            return None;
        }
        let c = self.model.cells[self.cell];
        self.cell = c.next;
        Some(c.point)
    }
}
