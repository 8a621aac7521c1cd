//! Connectivity traversal over a triangulated [`SurfaceModel`]: unique
//! triangle and edge enumeration, hull walking and void suppression.

use crate::geometry::{Point, Point3};
use crate::model::{SurfaceModel, NULL_POINT};

/// Unique triangles of a model in ascending `p1` order.
///
/// A candidate `(p1, p2, p3)` is taken from consecutive counter-clockwise
/// neighbors of `p1` and kept only when `p2 > p1`, `p3 > p1` and `p1 -> p2`
/// is not the hull edge leaving `p1`, which would close the outer face.
pub struct Triangles<'a> {
    model: &'a SurfaceModel,
    p1: usize,
    end: usize,
    ring: Vec<usize>,
    slot: usize,
}

impl<'a> Triangles<'a> {
    pub fn range(model: &'a SurfaceModel, start: usize, end: usize) -> Self {
        let end = end.min(model.num_points());
        let mut it = Self {
            model,
            p1: start,
            end,
            ring: Vec::new(),
            slot: 0,
        };
        it.load();
        it
    }

    /// Continues the enumeration after the candidate `(p1, p2, _)`.
    pub fn resume(model: &'a SurfaceModel, p1: usize, p2: usize) -> Self {
        let mut it = Self::range(model, p1, model.num_points());
        if let Some(i) = it.ring.iter().position(|&q| q == p2) {
            it.slot = i + 1;
        }
        it
    }

    fn load(&mut self) {
        self.ring.clear();
        self.slot = 0;
        if self.p1 < self.end {
            self.ring.extend(self.model.neighbors(self.p1));
        }
    }
}

impl Iterator for Triangles<'_> {
    type Item = [usize; 3];

    fn next(&mut self) -> Option<[usize; 3]> {
        loop {
            if self.p1 >= self.end {
                return None;
            }
            if self.slot >= self.ring.len() {
                self.p1 += 1;
                self.load();
                continue;
            }
            let i = self.slot;
            self.slot += 1;
            if self.ring.len() < 2 {
                continue;
            }
            let p1 = self.p1;
            let p2 = self.ring[i];
            let p3 = self.ring[(i + 1) % self.ring.len()];
            if p2 > p1 && p3 > p1 && self.model.hull_next(p1) != p2 {
                return Some([p1, p2, p3]);
            }
        }
    }
}

/// All unique triangles of `model`.
pub fn triangles(model: &SurfaceModel) -> Triangles<'_> {
    Triangles::range(model, 0, model.num_points())
}

/// Unique edges `(p1, p2)` with `p2 > p1`, in ascending `p1` order.
pub struct Edges<'a> {
    model: &'a SurfaceModel,
    p1: usize,
    end: usize,
    ring: Vec<usize>,
    slot: usize,
}

impl<'a> Edges<'a> {
    pub fn range(model: &'a SurfaceModel, start: usize, end: usize) -> Self {
        let end = end.min(model.num_points());
        let mut it = Self {
            model,
            p1: start,
            end,
            ring: Vec::new(),
            slot: 0,
        };
        it.load();
        it
    }

    /// Continues the enumeration after edge `(p1, p2)`.
    pub fn resume(model: &'a SurfaceModel, p1: usize, p2: usize) -> Self {
        let mut it = Self::range(model, p1, model.num_points());
        if let Some(i) = it.ring.iter().position(|&q| q == p2) {
            it.slot = i + 1;
        }
        it
    }

    fn load(&mut self) {
        self.ring.clear();
        self.slot = 0;
        if self.p1 < self.end {
            self.ring.extend(self.model.neighbors(self.p1));
        }
    }
}

impl Iterator for Edges<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<(usize, usize)> {
        loop {
            if self.p1 >= self.end {
                return None;
            }
            match self.ring.get(self.slot) {
                Some(&p2) => {
                    self.slot += 1;
                    if p2 > self.p1 {
                        return Some((self.p1, p2));
                    }
                }
                None => {
                    self.p1 += 1;
                    self.load();
                }
            }
        }
    }
}

pub fn edges(model: &SurfaceModel) -> Edges<'_> {
    Edges::range(model, 0, model.num_points())
}

/// Hull point indices walked clockwise from the designated hull point. The
/// first index is repeated at the end.
pub fn hull_indices(model: &SurfaceModel) -> Vec<usize> {
    let Some(start) = model.hull_point() else {
        return Vec::new();
    };
    let mut out = vec![start];
    let mut p = start;
    loop {
        p = model.hull_next(p);
        if p == NULL_POINT || out.len() > model.num_points() {
            break;
        }
        out.push(p);
        if p == start {
            break;
        }
    }
    out
}

/// Closed hull polyline.
pub fn hull_polyline(model: &SurfaceModel) -> Vec<Point3> {
    hull_indices(model)
        .into_iter()
        .map(|p| model.point(p))
        .collect()
}

/// Returns `true` if the triangle lies in a void region.
pub fn triangle_is_void(model: &SurfaceModel, t: [usize; 3]) -> bool {
    if t.iter().any(|&p| model.is_void_point(p)) {
        return true;
    }
    if t.iter().all(|&p| model.is_void_boundary(p)) {
        let (a, b, c) = (model.point(t[0]), model.point(t[1]), model.point(t[2]));
        let centroid = Point::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0);
        return model.in_void_region(centroid);
    }
    false
}

/// Returns `true` if the edge lies in a void region. Void boundary segments
/// themselves are not void.
pub fn edge_is_void(model: &SurfaceModel, a: usize, b: usize) -> bool {
    if model.is_void_point(a) || model.is_void_point(b) {
        return true;
    }
    if model.is_void_boundary(a) && model.is_void_boundary(b) && !model.is_void_segment(a, b) {
        let (pa, pb) = (model.point(a), model.point(b));
        return model.in_void_region(Point::new((pa.x + pb.x) / 2.0, (pa.y + pb.y) / 2.0));
    }
    false
}

/// Scratch marker set on a model. Every marker set through the guard is
/// cleared when it is dropped, whichever way the query exits.
pub(crate) struct Markers<'a> {
    model: &'a SurfaceModel,
    marked: Vec<usize>,
}

impl<'a> Markers<'a> {
    pub(crate) fn new(model: &'a SurfaceModel) -> Self {
        Self {
            model,
            marked: Vec::new(),
        }
    }

    pub(crate) fn mark(&mut self, p: usize) -> bool {
        let set = self.model.set_marker(p);
        if set {
            self.marked.push(p);
        }
        set
    }

    pub(crate) fn is_marked(&self, p: usize) -> bool {
        self.model.is_marked(p)
    }

    pub(crate) fn len(&self) -> usize {
        self.marked.len()
    }

    /// Smallest index range holding every marked point.
    pub(crate) fn span(&self) -> std::ops::Range<usize> {
        match (self.marked.iter().min(), self.marked.iter().max()) {
            (Some(&lo), Some(&hi)) => lo..hi + 1,
            _ => 0..0,
        }
    }
}

impl Drop for Markers<'_> {
    fn drop(&mut self) {
        for &p in &self.marked {
            self.model.clear_marker(p);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::FeatureKind;
    use std::collections::HashSet;

    /// Regular `n x n` grid split along one diagonal per cell.
    pub(crate) fn grid(n: usize) -> SurfaceModel {
        let mut pts = Vec::new();
        for j in 0..n {
            for i in 0..n {
                pts.push(Point3::new(i as f64, j as f64, (i * j) as f64));
            }
        }
        let mut tris = Vec::new();
        for j in 0..n - 1 {
            for i in 0..n - 1 {
                let a = j * n + i;
                tris.push([a, a + 1, a + n + 1]);
                tris.push([a, a + n + 1, a + n]);
            }
        }
        SurfaceModel::from_triangles(pts, &tris).unwrap()
    }

    #[test]
    fn unique_triangles_match_brute_force() {
        let m = grid(5);
        let tris: Vec<[usize; 3]> = triangles(&m).collect();
        // A brute force walk that collects every fan triangle as a sorted set.
        let mut brute = HashSet::new();
        for p in 0..m.num_points() {
            let ring: Vec<usize> = m.neighbors(p).collect();
            for i in 0..ring.len() {
                let (a, b) = (ring[i], ring[(i + 1) % ring.len()]);
                if m.hull_next(p) == a {
                    continue;
                }
                let mut t = [p, a, b];
                t.sort_unstable();
                brute.insert(t);
            }
        }
        assert_eq!(tris.len(), brute.len());
        let unique: HashSet<[usize; 3]> = tris
            .iter()
            .map(|t| {
                let mut s = *t;
                s.sort_unstable();
                s
            })
            .collect();
        assert_eq!(unique, brute);
        assert_eq!(tris.len(), 32);
    }

    #[test]
    fn unique_edges_match_euler() {
        let m = grid(4);
        let e = edges(&m).count();
        let t = triangles(&m).count();
        let h = hull_indices(&m).len() - 1;
        // E = (3T + H) / 2 for a triangulated disk
        assert_eq!(2 * e, 3 * t + h);
    }

    #[test]
    fn resume_continues_after_cursor() {
        let m = grid(4);
        let all: Vec<[usize; 3]> = triangles(&m).collect();
        let [p1, p2, _] = all[3];
        let rest: Vec<[usize; 3]> = Triangles::resume(&m, p1, p2).collect();
        assert_eq!(rest, all[4..].to_vec());
    }

    #[test]
    fn hull_walk_closes() {
        let m = grid(3);
        let hull = hull_indices(&m);
        assert_eq!(hull.len(), 9);
        assert_eq!(hull.first(), hull.last());
    }

    #[test]
    fn void_triangles_are_suppressed() {
        let mut pts = Vec::new();
        for j in 0..4 {
            for i in 0..4 {
                pts.push(Point3::new(i as f64 * 10.0, j as f64 * 10.0, 0.0));
            }
        }
        let mut m = SurfaceModel::from_points(pts);
        m.add_feature(
            FeatureKind::Void,
            1,
            1,
            &[
                Point3::new(10.0, 10.0, 0.0),
                Point3::new(20.0, 10.0, 0.0),
                Point3::new(20.0, 20.0, 0.0),
                Point3::new(10.0, 20.0, 0.0),
                Point3::new(10.0, 10.0, 0.0),
            ],
        )
        .unwrap();
        m.triangulate().unwrap();
        let void = triangles(&m).filter(|t| triangle_is_void(&m, *t)).count();
        assert_eq!(void, 2);
        let a = m.find_point(10.0, 10.0).unwrap();
        let b = m.find_point(20.0, 10.0).unwrap();
        assert!(!edge_is_void(&m, a, b));
    }

    #[test]
    fn markers_are_cleared_on_drop() {
        let m = grid(3);
        {
            let mut marks = Markers::new(&m);
            assert!(marks.mark(1));
            assert!(marks.is_marked(1));
            assert_eq!(marks.len(), 1);
        }
        assert!(!m.has_markers());
    }
}
