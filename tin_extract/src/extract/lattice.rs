use log::debug;

use crate::callback::{Bridge, FeatureSink};
use crate::clip::{self, ActiveFence, Fence, FenceOption};
use crate::error::{ExtractError, Result};
use crate::geometry::{BoundingBox, Point3};
use crate::lattice::Lattice;
use crate::model::{FeatureKind, NULL_FEATURE_ID, NULL_USER_TAG};

use super::{clip_pieces, skirt};

/// Loads every occurrence of a lattice kind from a grid surface.
///
/// * `LatticePoint`: one batch per non-null node.
/// * `Lattice`: a closed quad per cell whose four corners are non-null.
/// * `LatticeEdge`: a vertical panel down to the lowest elevation for each
///   node edge on the boundary of the valid area.
/// * `LatticeXLine` / `LatticeYLine`: one polyline per row / column, broken
///   at null nodes.
pub fn extract_lattice(
    lattice: &Lattice,
    kind: FeatureKind,
    fence: Option<&Fence>,
    sink: &mut dyn FeatureSink,
) -> Result<()> {
    if !kind.is_lattice() {
        return Err(ExtractError::InvalidFeatureKind(kind));
    }
    lattice.validate()?;
    let fence = clip::activate(fence, lattice.bbox())?;
    let mut out = LatticeOut {
        kind,
        fence: fence.as_ref(),
        bridge: Bridge::new(sink, None),
    };
    match kind {
        FeatureKind::LatticePoint => points(lattice, &mut out),
        FeatureKind::Lattice => cells(lattice, &mut out),
        FeatureKind::LatticeEdge => edges(lattice, &mut out),
        FeatureKind::LatticeXLine => rows(lattice, &mut out),
        FeatureKind::LatticeYLine => columns(lattice, &mut out),
        _ => Err(ExtractError::InvalidFeatureKind(kind)),
    }?;
    debug!("{kind:?}: {} batches delivered", out.bridge.delivered());
    Ok(())
}

struct LatticeOut<'f, 's> {
    kind: FeatureKind,
    fence: Option<&'f ActiveFence>,
    bridge: Bridge<'s>,
}

impl LatticeOut<'_, '_> {
    fn point(&mut self, p: Point3) -> Result<()> {
        if let Some(f) = self.fence {
            if !f.clip.point_passes(p, f.option) {
                return Ok(());
            }
        }
        self.bridge.deliver(self.kind, NULL_USER_TAG, NULL_FEATURE_ID, &[p])
    }

    /// Emits one item after the bounding box gate and the fence clip.
    fn item(&mut self, points: Vec<Point3>, gated: bool) -> Result<()> {
        if let (Some(f), true) = (self.fence, gated) {
            let overlaps = BoundingBox::from_points(&points)
                .is_some_and(|bb| bb.overlaps(&f.clip.bbox()));
            if !overlaps {
                if f.option == FenceOption::Outside {
                    return self
                        .bridge
                        .deliver(self.kind, NULL_USER_TAG, NULL_FEATURE_ID, &points);
                }
                return Ok(());
            }
        }
        for piece in clip_pieces(self.fence, points) {
            self.bridge
                .deliver(self.kind, NULL_USER_TAG, NULL_FEATURE_ID, &piece)?;
        }
        Ok(())
    }

    fn line(&mut self, line: &mut Vec<Point3>) -> Result<()> {
        if line.len() > 1 {
            self.item(std::mem::take(line), false)?;
        }
        line.clear();
        Ok(())
    }
}

fn points(lattice: &Lattice, out: &mut LatticeOut<'_, '_>) -> Result<()> {
    for row in 0..lattice.rows {
        for col in 0..lattice.cols {
            if let Some(p) = lattice.node(row, col) {
                out.point(p)?;
            }
        }
    }
    Ok(())
}

fn cells(lattice: &Lattice, out: &mut LatticeOut<'_, '_>) -> Result<()> {
    for row in 0..lattice.rows.saturating_sub(1) {
        for col in 0..lattice.cols.saturating_sub(1) {
            let corners = (
                lattice.node(row, col),
                lattice.node(row, col + 1),
                lattice.node(row + 1, col + 1),
                lattice.node(row + 1, col),
            );
            if let (Some(a), Some(b), Some(c), Some(d)) = corners {
                out.item(vec![a, b, c, d, a], true)?;
            }
        }
    }
    Ok(())
}

fn edges(lattice: &Lattice, out: &mut LatticeOut<'_, '_>) -> Result<()> {
    let Some(z_min) = lattice.z_min() else {
        return Ok(());
    };
    let valid = |row: usize, col: usize| lattice.get(row, col).is_some();
    // edges along rows
    for row in 0..lattice.rows {
        for col in 0..lattice.cols.saturating_sub(1) {
            let (Some(a), Some(b)) = (lattice.node(row, col), lattice.node(row, col + 1)) else {
                continue;
            };
            let below = row > 0 && valid(row - 1, col) && valid(row - 1, col + 1);
            let above = valid(row + 1, col) && valid(row + 1, col + 1);
            if !(below && above) {
                out.item(skirt(a, b, z_min).to_vec(), true)?;
            }
        }
    }
    // edges along columns
    for col in 0..lattice.cols {
        for row in 0..lattice.rows.saturating_sub(1) {
            let (Some(a), Some(b)) = (lattice.node(row, col), lattice.node(row + 1, col)) else {
                continue;
            };
            let left = col > 0 && valid(row, col - 1) && valid(row + 1, col - 1);
            let right = valid(row, col + 1) && valid(row + 1, col + 1);
            if !(left && right) {
                out.item(skirt(a, b, z_min).to_vec(), true)?;
            }
        }
    }
    Ok(())
}

fn rows(lattice: &Lattice, out: &mut LatticeOut<'_, '_>) -> Result<()> {
    let mut line = Vec::new();
    for row in 0..lattice.rows {
        for col in 0..lattice.cols {
            match lattice.node(row, col) {
                Some(p) => line.push(p),
                None => out.line(&mut line)?,
            }
        }
        out.line(&mut line)?;
    }
    Ok(())
}

fn columns(lattice: &Lattice, out: &mut LatticeOut<'_, '_>) -> Result<()> {
    let mut line = Vec::new();
    for col in 0..lattice.cols {
        for row in 0..lattice.rows {
            match lattice.node(row, col) {
                Some(p) => line.push(p),
                None => out.line(&mut line)?,
            }
        }
        out.line(&mut line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::Collector;

    /// 4 x 4 nodes, unit spacing, z = row + col, with node (1, 1) null.
    fn holed() -> Lattice {
        let mut l = Lattice::new((0.0, 0.0), 1.0, 1.0, 4, 4, -1.0);
        for row in 0..4 {
            for col in 0..4 {
                if (row, col) != (1, 1) {
                    l.set(row, col, (row + col) as f64);
                }
            }
        }
        l
    }

    fn run(l: &Lattice, kind: FeatureKind, fence: Option<&Fence>) -> Collector {
        let mut c = Collector::new();
        extract_lattice(l, kind, fence, &mut c).unwrap();
        c
    }

    #[test]
    fn points_and_cells_skip_nulls() {
        let l = holed();
        assert_eq!(run(&l, FeatureKind::LatticePoint, None).occurrences.len(), 15);
        // 9 cells, 4 of them touch the null node
        let cells = run(&l, FeatureKind::Lattice, None);
        assert_eq!(cells.occurrences.len(), 5);
        assert!(cells.occurrences.iter().all(|o| o.points.len() == 5));
    }

    #[test]
    fn lines_break_at_null_nodes() {
        let l = holed();
        let rows = run(&l, FeatureKind::LatticeXLine, None);
        let sizes: Vec<usize> = rows.occurrences.iter().map(|o| o.points.len()).collect();
        // row 1 splits into a single node (dropped) and two nodes
        assert_eq!(sizes, vec![4, 2, 4, 4]);
        let cols = run(&l, FeatureKind::LatticeYLine, None);
        assert_eq!(cols.occurrences.len(), 4);
    }

    #[test]
    fn edges_outline_the_valid_area() {
        let mut full = Lattice::new((0.0, 0.0), 1.0, 1.0, 3, 3, -1.0);
        for row in 0..3 {
            for col in 0..3 {
                full.set(row, col, 5.0 + row as f64);
            }
        }
        let c = run(&full, FeatureKind::LatticeEdge, None);
        // perimeter of a 2 x 2 cell block
        assert_eq!(c.occurrences.len(), 8);
        for o in &c.occurrences {
            assert_eq!(o.points[2].z, 5.0);
            assert_eq!(o.points[0], o.points[4]);
        }
    }

    #[test]
    fn outside_fence_keeps_far_cells_whole() {
        let l = holed();
        let fence = Fence::block(BoundingBox::new(-0.5, -0.5, 1.5, 1.5), FenceOption::Outside);
        let c = run(&l, FeatureKind::Lattice, Some(&fence));
        for o in &c.occurrences {
            for p in &o.points {
                assert!(p.x >= 1.5 - 1e-9 || p.y >= 1.5 - 1e-9);
            }
        }
        assert!(c.occurrences.iter().any(|o| o.points.len() == 5 && o.points[0].x == 2.0));
    }

    #[test]
    fn tin_kinds_are_rejected() {
        let l = holed();
        let mut c = Collector::new();
        assert!(matches!(
            extract_lattice(&l, FeatureKind::Triangle, None, &mut c),
            Err(ExtractError::InvalidFeatureKind(_))
        ));
    }
}
