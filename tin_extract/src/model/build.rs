//! Construction of surface models: raw data loading, connectivity from a
//! triangle list, triangulation and feature linking.

use log::{debug, warn};

use super::{
    Feature, FeatureCell, FeatureKind, FeaturePoints, FeatureState, ListCell, ModelMode, Node,
    SurfaceModel, NULL_CELL, NULL_POINT, VOID_BOUNDARY, VOID_POINT,
};
use crate::error::{ExtractError, Result};
use crate::geometry::{orient2d, Point3};

impl SurfaceModel {
    /// Appends raw points to an untriangulated model.
    pub fn add_points(&mut self, points: &[Point3]) -> Result<()> {
        if self.is_triangulated() {
            return Err(ExtractError::InvalidModel(
                "points cannot be added to a triangulated model".into(),
            ));
        }
        self.points.extend_from_slice(points);
        Ok(())
    }

    /// Adds a feature from coordinates and returns its table index.
    ///
    /// On a raw model the points are appended to the point array as one
    /// contiguous range. On a triangulated model each coordinate must match an
    /// existing vertex; features that cannot be linked are kept in the
    /// `TinError` state with their raw points.
    pub fn add_feature(
        &mut self,
        kind: FeatureKind,
        user_tag: u64,
        feature_id: u64,
        points: &[Point3],
    ) -> Result<usize> {
        if !kind.is_stored() {
            return Err(ExtractError::InvalidFeatureKind(kind));
        }
        if points.is_empty() {
            return Err(ExtractError::InvalidModel("feature has no points".into()));
        }
        let index = self.features.len();
        match self.mode {
            ModelMode::Data => {
                let first = self.points.len();
                self.points.extend_from_slice(points);
                self.features.push(Feature {
                    kind,
                    state: FeatureState::Data,
                    user_tag,
                    feature_id,
                    points: FeaturePoints::Range {
                        first,
                        count: points.len(),
                    },
                });
            }
            ModelMode::Tin => {
                let indices: Option<Vec<usize>> =
                    points.iter().map(|p| self.find_point(p.x, p.y)).collect();
                self.features.push(Feature {
                    kind,
                    state: FeatureState::TinError,
                    user_tag,
                    feature_id,
                    points: FeaturePoints::Stored(points.to_vec()),
                });
                match indices {
                    Some(indices) => self.link_feature(index, indices),
                    None => warn!("feature {index} does not match the triangulated vertices"),
                }
                self.refresh_voids();
            }
        }
        Ok(index)
    }

    /// Adds a feature referencing existing point indices.
    ///
    /// Raw models keep the list as an offsets array; triangulated models link
    /// it into the feature chains.
    pub fn add_feature_indices(
        &mut self,
        kind: FeatureKind,
        user_tag: u64,
        feature_id: u64,
        indices: Vec<usize>,
    ) -> Result<usize> {
        if !kind.is_stored() {
            return Err(ExtractError::InvalidFeatureKind(kind));
        }
        if let Some(bad) = indices.iter().find(|&&i| i >= self.points.len()) {
            return Err(ExtractError::InvalidModel(format!(
                "feature point index {bad} out of range"
            )));
        }
        let index = self.features.len();
        match self.mode {
            ModelMode::Data => self.features.push(Feature {
                kind,
                state: FeatureState::OffsetsArray,
                user_tag,
                feature_id,
                points: FeaturePoints::Offsets(indices),
            }),
            ModelMode::Tin => {
                let stored = indices.iter().map(|&i| self.points[i]).collect();
                self.features.push(Feature {
                    kind,
                    state: FeatureState::TinError,
                    user_tag,
                    feature_id,
                    points: FeaturePoints::Stored(stored),
                });
                self.link_feature(index, indices);
                self.refresh_voids();
            }
        }
        Ok(index)
    }

    /// Marks a feature as deleted. Deleted features are never extracted.
    pub fn delete_feature(&mut self, index: usize) -> Result<()> {
        self.set_state(index, FeatureState::Deleted)
    }

    /// Marks a feature as rolled back.
    pub fn rollback_feature(&mut self, index: usize) -> Result<()> {
        self.set_state(index, FeatureState::Rollback)
    }

    fn set_state(&mut self, index: usize, state: FeatureState) -> Result<()> {
        let feature = self
            .features
            .get_mut(index)
            .ok_or_else(|| ExtractError::InvalidModel(format!("no feature {index}")))?;
        feature.state = state;
        self.refresh_voids();
        Ok(())
    }

    /// Builds a triangulated model from vertices and triangle indices.
    ///
    /// Vertices are reordered by ascending x (then y) and exact planar
    /// duplicates are merged. Degenerate triangles are dropped.
    pub fn from_triangles(points: Vec<Point3>, triangles: &[[usize; 3]]) -> Result<Self> {
        if let Some(t) = triangles.iter().find(|t| t.iter().any(|&i| i >= points.len())) {
            return Err(ExtractError::InvalidModel(format!(
                "triangle {t:?} references a missing vertex"
            )));
        }
        let (sorted, remap) = sort_points(&points);
        let mut model = SurfaceModel::from_points(sorted);
        let tris: Vec<[usize; 3]> = triangles
            .iter()
            .map(|t| [remap[t[0]], remap[t[1]], remap[t[2]]])
            .collect();
        model.link_triangles(&tris)?;
        Ok(model)
    }

    /// Triangulates a raw model.
    ///
    /// Breakline, void, hole, island and hull features become constraint
    /// edges. Raw features are then converted into linked chains; features
    /// that cannot be linked are kept in the `TinError` state.
    pub fn triangulate(&mut self) -> Result<()> {
        if self.is_triangulated() {
            return Ok(());
        }
        if self.points.len() < 3 {
            return Err(ExtractError::InvalidModel(
                "at least three points are required to triangulate".into(),
            ));
        }
        let (sorted, remap) = sort_points(&self.points);
        let mut next = SurfaceModel::from_points(sorted);

        let mut edges: Vec<(usize, usize)> = Vec::new();
        for f in &self.features {
            if !f.state.is_live()
                || !matches!(
                    f.kind,
                    FeatureKind::Breakline
                        | FeatureKind::Void
                        | FeatureKind::Hole
                        | FeatureKind::Island
                        | FeatureKind::Hull
                )
            {
                continue;
            }
            let idx = raw_indices(f);
            for w in idx.windows(2) {
                let (a, b) = (remap[w[0]], remap[w[1]]);
                if a != b && !edges.contains(&(a, b)) && !edges.contains(&(b, a)) {
                    edges.push((a, b));
                }
            }
        }

        let triangles: Vec<[usize; 3]> = if edges.is_empty() {
            let coords: Vec<delaunator::Point> = next
                .points
                .iter()
                .map(|p| delaunator::Point { x: p.x, y: p.y })
                .collect();
            let triangulation = delaunator::triangulate(&coords);
            triangulation
                .triangles
                .chunks(3)
                .map(|c| [c[0], c[1], c[2]])
                .collect()
        } else {
            let coords: Vec<(f64, f64)> = next.points.iter().map(|p| (p.x, p.y)).collect();
            cdt::triangulate_with_edges(&coords, &edges)
                .map_err(|e| ExtractError::InvalidModel(format!("triangulation failed: {e:?}")))?
                .into_iter()
                .map(|t| [t.0, t.1, t.2])
                .collect()
        };
        next.link_triangles(&triangles)?;

        for f in &self.features {
            let index = next.features.len();
            let raw = raw_indices(f);
            let stored: Vec<Point3> = raw.iter().map(|&i| self.points[i]).collect();
            let mapped: Vec<usize> = raw.iter().map(|&i| remap[i]).collect();
            let live = f.state.is_live() || f.state == FeatureState::OffsetsArray;
            next.features.push(Feature {
                state: if live { FeatureState::TinError } else { f.state },
                points: FeaturePoints::Stored(stored),
                ..f.clone()
            });
            if live {
                next.link_feature(index, mapped);
            }
        }
        next.refresh_voids();
        debug!(
            "triangulated {} points, {} features, {} constraint edges",
            next.points.len(),
            next.features.len(),
            edges.len()
        );
        *self = next;
        Ok(())
    }

    /// Builds neighbor lists and the hull from counter-clockwise triangles.
    fn link_triangles(&mut self, triangles: &[[usize; 3]]) -> Result<()> {
        let n = self.points.len();
        let mut fans: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
        for t in triangles {
            let [a, mut b, mut c] = *t;
            if a == b || b == c || a == c {
                continue;
            }
            let area = orient2d(self.points[a].xy(), self.points[b].xy(), self.points[c].xy());
            if area == 0.0 {
                continue;
            }
            if area < 0.0 {
                std::mem::swap(&mut b, &mut c);
            }
            fans[a].push((b, c));
            fans[b].push((c, a));
            fans[c].push((a, b));
        }
        if fans.iter().all(|f| f.is_empty()) {
            return Err(ExtractError::InvalidModel("no valid triangles".into()));
        }

        self.nodes = vec![Node::default(); n];
        self.cells.clear();
        for (p, fan) in fans.iter().enumerate() {
            if fan.is_empty() {
                continue;
            }
            let starts: Vec<usize> = fan
                .iter()
                .map(|e| e.0)
                .filter(|from| !fan.iter().any(|e| e.1 == *from))
                .collect();
            if starts.len() > 1 {
                return Err(ExtractError::InvalidModel(format!(
                    "point {p} has a non-manifold neighborhood"
                )));
            }
            let on_hull = starts.len() == 1;
            let start = starts.first().copied().unwrap_or(fan[0].0);
            let mut order = vec![start];
            let mut current = start;
            loop {
                let mut next = fan.iter().filter(|e| e.0 == current).map(|e| e.1);
                let Some(nx) = next.next() else { break };
                if next.next().is_some() {
                    return Err(ExtractError::InvalidModel(format!(
                        "duplicate triangle at point {p}"
                    )));
                }
                if nx == start {
                    break;
                }
                if order.len() > fan.len() {
                    return Err(ExtractError::InvalidModel(format!(
                        "broken neighbor cycle at point {p}"
                    )));
                }
                order.push(nx);
                current = nx;
            }
            let expected = if on_hull { fan.len() + 1 } else { fan.len() };
            if order.len() != expected {
                return Err(ExtractError::InvalidModel(format!(
                    "point {p} has a disconnected triangle fan"
                )));
            }
            if on_hull {
                self.nodes[p].hull_next = order[order.len() - 1];
            }
            let mut head = NULL_CELL;
            for &q in order.iter().rev() {
                self.cells.push(ListCell {
                    point: q,
                    next: head,
                });
                head = self.cells.len() - 1;
            }
            self.nodes[p].neighbors = head;
        }

        self.hull_point = (0..n)
            .find(|&p| self.nodes[p].hull_next != NULL_POINT)
            .unwrap_or(NULL_POINT);
        if self.hull_point != NULL_POINT {
            let mut p = self.hull_point;
            let mut steps = 0;
            loop {
                p = self.nodes[p].hull_next;
                steps += 1;
                if p == self.hull_point {
                    break;
                }
                if p == NULL_POINT || steps > n {
                    return Err(ExtractError::InvalidModel("hull does not close".into()));
                }
            }
        }
        self.mode = ModelMode::Tin;
        Ok(())
    }

    /// Links `indices` as the chain of feature `index`. Leaves the feature in
    /// the `TinError` state when the point sequence cannot form a chain.
    fn link_feature(&mut self, index: usize, mut indices: Vec<usize>) {
        indices.dedup();
        let kind = self.features[index].kind;
        let closed = indices.len() > 2 && indices.first() == indices.last();
        if closed {
            indices.pop();
        }
        let mut seen = indices.clone();
        seen.sort_unstable();
        seen.dedup();
        let valid = match kind {
            FeatureKind::GroupSpots => !indices.is_empty(),
            k if k.is_area() => closed && indices.len() >= 3,
            _ => indices.len() >= 2,
        };
        if !valid || seen.len() != indices.len() {
            warn!("feature {index} ({kind:?}) cannot be linked and is flagged as a tin error");
            return;
        }
        for (i, &p) in indices.iter().enumerate() {
            let next_point = match indices.get(i + 1) {
                Some(&q) => q,
                None if closed => indices[0],
                None => NULL_POINT,
            };
            self.feature_cells.push(FeatureCell {
                feature: index,
                next_point,
                next: self.nodes[p].features,
            });
            self.nodes[p].features = self.feature_cells.len() - 1;
        }
        let feature = &mut self.features[index];
        feature.state = FeatureState::Tin;
        feature.points = FeaturePoints::Chain { head: indices[0] };
    }

    /// Recomputes the void bits from the live void, hole and island chains.
    fn refresh_voids(&mut self) {
        if !self.is_triangulated() {
            return;
        }
        for node in &mut self.nodes {
            node.void_bits = 0;
        }
        self.has_voids = self.features.iter().any(|f| {
            f.state == FeatureState::Tin && matches!(f.kind, FeatureKind::Void | FeatureKind::Hole)
        });
        if !self.has_voids {
            return;
        }
        for i in 0..self.features.len() {
            let f = &self.features[i];
            if f.state != FeatureState::Tin
                || !matches!(
                    f.kind,
                    FeatureKind::Void | FeatureKind::Hole | FeatureKind::Island
                )
            {
                continue;
            }
            for p in self.feature_point_indices(i) {
                self.nodes[p].void_bits |= VOID_BOUNDARY;
            }
        }
        for p in 0..self.points.len() {
            if self.nodes[p].void_bits & VOID_BOUNDARY == 0
                && self.in_void_region(self.points[p].xy())
            {
                self.nodes[p].void_bits |= VOID_POINT;
            }
        }
    }
}

/// Point indices of a raw feature in the pre-triangulation point array.
fn raw_indices(f: &Feature) -> Vec<usize> {
    match &f.points {
        FeaturePoints::Range { first, count } => (*first..first + count).collect(),
        FeaturePoints::Offsets(o) => o.clone(),
        FeaturePoints::Chain { .. } | FeaturePoints::Stored(_) => Vec::new(),
    }
}

/// Sorts points by x then y, merging exact planar duplicates. Returns the new
/// point array and the old-to-new index map.
fn sort_points(points: &[Point3]) -> (Vec<Point3>, Vec<usize>) {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| {
        points[a]
            .x
            .total_cmp(&points[b].x)
            .then(points[a].y.total_cmp(&points[b].y))
    });
    let mut sorted: Vec<Point3> = Vec::with_capacity(points.len());
    let mut remap = vec![0; points.len()];
    for old in order {
        let p = points[old];
        match sorted.last() {
            Some(last) if last.same_xy(&p) => {}
            _ => sorted.push(p),
        }
        remap[old] = sorted.len() - 1;
    }
    (sorted, remap)
}
