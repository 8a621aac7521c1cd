use std::f64::consts::{FRAC_PI_2, TAU};

use log::{debug, trace};

use crate::callback::{Bridge, FeatureSink};
use crate::config::ExtractConfig;
use crate::error::{ExtractError, Result};
use crate::geometry::{distance, lerp, segment_intersection, Point, Point3};
use crate::model::{FeatureKind, SurfaceModel, NULL_FEATURE_ID};
use crate::traversal;

fn angle(from: Point3, to: Point3) -> f64 {
    (to.y - from.y).atan2(to.x - from.x).rem_euclid(TAU)
}

/// Direction halving the interior angle at hull vertex `hp`.
fn bisector(pp: Point3, hp: Point3, np: Point3) -> f64 {
    let mut ang1 = angle(hp, np);
    let ang2 = angle(hp, pp);
    if ang1 < ang2 {
        ang1 += TAU;
    }
    ((ang1 + ang2) / 2.0).rem_euclid(TAU)
}

/// Nearest crossing of the ray segment `start-end` with a closed hull, with
/// the elevation interpolated along the hull segment.
fn truncate_at_hull(hull: &[Point3], start: Point3, end: Point) -> Option<Point3> {
    let mut best: Option<(f64, Point3)> = None;
    for w in hull.windows(2) {
        if let Some((t, u)) = segment_intersection(start.xy(), end, w[0].xy(), w[1].xy()) {
            if best.map_or(true, |(bt, _)| t < bt) {
                best = Some((t, lerp(w[0], w[1], u)));
            }
        }
    }
    best.map(|(_, p)| p)
}

/// Generates slope indicator lines from the hull of `model1` to the hull of
/// `model2`.
///
/// Stations are placed every `minor` units clockwise along the first hull.
/// Each line leaves its station on the inward bisector (at hull vertices) or
/// the inward normal (along hull segments) and stops at the nearest crossing
/// with the second hull. Every `major / minor`-th line carries user tag `0`,
/// the others `1`. Stations whose line never meets the second hull are
/// skipped.
pub fn extract_slope_lines(
    model1: &SurfaceModel,
    model2: &SurfaceModel,
    major: f64,
    minor: f64,
    config: &ExtractConfig,
    sink: &mut dyn FeatureSink,
) -> Result<()> {
    if !model1.is_triangulated() || !model2.is_triangulated() {
        return Err(ExtractError::NotTriangulated(FeatureKind::SlopeLine));
    }
    if major.is_nan() || major <= 0.0 {
        return Err(ExtractError::InvalidModel(
            "major slope line interval must be positive".into(),
        ));
    }
    let minor = if minor <= 0.0 || minor > major { major } else { minor };
    let per_major = ((major / minor) as usize).max(1);
    let tol = config.point_tolerance;

    let hull1 = traversal::hull_polyline(model1);
    let hull2 = traversal::hull_polyline(model2);
    let Some(bbox2) = model2.bbox() else {
        return Ok(());
    };
    if hull1.len() < 3 || hull2.len() < 3 {
        return Ok(());
    }
    let radial = distance(
        Point::new(bbox2.min_x, bbox2.min_y),
        Point::new(bbox2.max_x, bbox2.max_y),
    );

    let segments = hull1.len() - 1;
    let mut bridge = Bridge::new(sink, config.check_stop_interval);
    let mut station = 0.0;
    let mut walked = 0.0;
    let mut interval = 0usize;
    for i in 0..segments {
        let (hp, np) = (hull1[i], hull1[i + 1]);
        let pp = hull1[(i + segments - 1) % segments];
        let length = distance(hp.xy(), np.xy());
        // the station at the far vertex belongs to the next segment
        while station < walked + length - tol {
            let along = station - walked;
            let (start, direction) = if along.abs() <= tol {
                (hp, bisector(pp, hp, np))
            } else {
                (lerp(hp, np, along / length), angle(hp, np) - FRAC_PI_2)
            };
            let end = Point::new(
                start.x + radial * direction.cos(),
                start.y + radial * direction.sin(),
            );
            match truncate_at_hull(&hull2, start, end) {
                Some(hit) => {
                    let tag = if interval % per_major == 0 { 0 } else { 1 };
                    bridge.deliver(FeatureKind::SlopeLine, tag, NULL_FEATURE_ID, &[start, hit])?;
                }
                None => trace!("slope line at station {station:.3} misses the second hull"),
            }
            interval += 1;
            station += minor;
        }
        walked += length;
    }
    debug!("{interval} slope line stations, {} lines", bridge.delivered());
    Ok(())
}
