use tin_extract::{
    sink_fn, Collector, ExtractConfig, ExtractError, Extractor, FeatureKind, Fence, FenceOption,
    FenceType, Occurrence, Point3, ScanContext, SurfaceModel,
};

/// Jittered 6 x 6 site with a breakline and a group of spot shots.
fn site() -> SurfaceModel {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut pts = Vec::new();
    for j in 0..6 {
        for i in 0..6 {
            let jx = ((i * 7 + j * 3) % 5) as f64 * 0.37;
            let jy = ((i * 3 + j * 5) % 7) as f64 * 0.29;
            pts.push(Point3::new(
                i as f64 * 10.0 + jx,
                j as f64 * 10.0 + jy,
                100.0 + i as f64 + 0.5 * j as f64 + jx,
            ));
        }
    }
    let mut m = SurfaceModel::new();
    m.add_points(&pts).unwrap();
    m.add_feature(FeatureKind::Breakline, 1, 10, &[pts[7], pts[14], pts[21]])
        .unwrap();
    m.add_feature(
        FeatureKind::GroupSpots,
        2,
        20,
        &[Point3::new(12.5, 31.5, 104.0), Point3::new(33.3, 17.7, 105.0)],
    )
    .unwrap();
    m.triangulate().unwrap();
    m
}

fn shape_fence(option: FenceOption) -> Fence {
    Fence::new(
        vec![
            Point3::new(15.0, 12.0, 0.0),
            Point3::new(42.0, 18.0, 0.0),
            Point3::new(38.0, 44.0, 0.0),
            Point3::new(20.0, 40.0, 0.0),
            Point3::new(15.0, 12.0, 0.0),
        ],
        FenceType::Shape,
        option,
    )
}

fn bulk(m: &SurfaceModel, kind: FeatureKind, max: usize, fence: Option<&Fence>) -> Vec<Occurrence> {
    let mut c = Collector::new();
    Extractor::new(m).extract(kind, max, fence, &mut c).unwrap();
    c.occurrences
}

fn scan(m: &SurfaceModel, kind: FeatureKind, max: usize, fence: Option<&Fence>) -> Vec<Occurrence> {
    ScanContext::new(m, kind, max, fence).unwrap().collect()
}

const KINDS: [FeatureKind; 12] = [
    FeatureKind::Spots,
    FeatureKind::RandomSpots,
    FeatureKind::FeatureSpot,
    FeatureKind::TinPoint,
    FeatureKind::GroupSpots,
    FeatureKind::Breakline,
    FeatureKind::Triangle,
    FeatureKind::TriangleInfo,
    FeatureKind::FlowArrow,
    FeatureKind::TinLine,
    FeatureKind::TinHull,
    FeatureKind::TriangleEdge,
];

#[test]
fn bulk_and_scan_deliver_the_same_sequence() {
    let m = site();
    let fences = [
        None,
        Some(shape_fence(FenceOption::Inside)),
        Some(shape_fence(FenceOption::Overlap)),
        Some(shape_fence(FenceOption::Outside)),
    ];
    for kind in KINDS {
        for fence in &fences {
            let a = bulk(&m, kind, 5, fence.as_ref());
            let b = scan(&m, kind, 5, fence.as_ref());
            assert_eq!(a, b, "{kind:?} with fence {fence:?}");
        }
    }
}

#[test]
fn ten_points_in_batches_of_four() {
    let pts: Vec<Point3> = (0..10).map(|i| Point3::new(i as f64, 0.0, 1.0)).collect();
    let m = SurfaceModel::from_points(pts);
    let batches = bulk(&m, FeatureKind::Spots, 4, None);
    let sizes: Vec<usize> = batches.iter().map(|o| o.points.len()).collect();
    assert_eq!(sizes, vec![4, 4, 2]);
}

#[test]
fn pentagon_hull_is_closed() {
    let mut m = SurfaceModel::from_points(
        (0..5)
            .map(|k| {
                let a = k as f64 * std::f64::consts::TAU / 5.0;
                Point3::new(10.0 * a.cos(), 10.0 * a.sin(), k as f64)
            })
            .collect(),
    );
    m.triangulate().unwrap();
    let hull = bulk(&m, FeatureKind::TinHull, 0, None);
    assert_eq!(hull.len(), 1);
    let pts = &hull[0].points;
    assert_eq!(pts.len(), 6);
    assert_eq!(pts[0], pts[5]);
}

#[test]
fn inside_and_outside_partition_the_spots() {
    let m = site();
    let fence = shape_fence(FenceOption::Inside);
    let poly: Vec<(f64, f64)> = fence.points.iter().map(|p| (p.x, p.y)).collect();
    let contains = |p: &Point3| {
        let mut inside = false;
        let mut j = poly.len() - 1;
        for i in 0..poly.len() {
            let (xi, yi) = poly[i];
            let (xj, yj) = poly[j];
            if (yi > p.y) != (yj > p.y) && p.x < (xj - xi) * (p.y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    };
    let inside: Vec<Point3> = bulk(&m, FeatureKind::Spots, 100, Some(&fence))
        .into_iter()
        .flat_map(|o| o.points)
        .collect();
    let outside: Vec<Point3> = bulk(
        &m,
        FeatureKind::Spots,
        100,
        Some(&shape_fence(FenceOption::Outside)),
    )
    .into_iter()
    .flat_map(|o| o.points)
    .collect();
    assert!(!inside.is_empty());
    assert!(inside.iter().all(contains));
    assert!(!outside.iter().any(contains));
    assert_eq!(inside.len() + outside.len(), m.num_points());
}

#[test]
fn degenerate_fence_is_ignored() {
    let m = site();
    let line = Fence::new(
        vec![Point3::new(0.0, 0.0, 0.0), Point3::new(30.0, 30.0, 0.0)],
        FenceType::Shape,
        FenceOption::Inside,
    );
    for kind in [FeatureKind::Spots, FeatureKind::Triangle, FeatureKind::TinLine] {
        assert_eq!(bulk(&m, kind, 7, Some(&line)), bulk(&m, kind, 7, None));
    }
}

#[test]
fn repeated_runs_are_identical() {
    let m = site();
    let fence = shape_fence(FenceOption::Overlap);
    for kind in [FeatureKind::TinLine, FeatureKind::TriangleInfo] {
        assert_eq!(
            bulk(&m, kind, 0, Some(&fence)),
            bulk(&m, kind, 0, Some(&fence))
        );
    }
    // an exhausted scan starts over
    let mut s = ScanContext::new(&m, FeatureKind::Triangle, 0, Some(&fence)).unwrap();
    let first: Vec<Occurrence> = s.by_ref().collect();
    let second: Vec<Occurrence> = s.collect();
    assert_eq!(first, second);
}

#[test]
fn fenced_extraction_leaves_no_markers() {
    let m = site();
    for option in [FenceOption::Inside, FenceOption::Overlap, FenceOption::Outside] {
        let fence = shape_fence(option);
        bulk(&m, FeatureKind::Triangle, 0, Some(&fence));
        bulk(&m, FeatureKind::TinLine, 0, Some(&fence));
        assert!(!m.has_markers());
    }
}

#[test]
fn failing_sink_aborts_the_run() {
    let m = site();
    let mut calls = 0;
    let mut sink = sink_fn(|_kind: FeatureKind, _tag: u64, _id: u64, _pts: &[Point3]| {
        calls += 1;
        if calls == 2 {
            Err("disk full".into())
        } else {
            Ok(())
        }
    });
    let err = Extractor::new(&m)
        .extract(FeatureKind::Spots, 4, None, &mut sink)
        .unwrap_err();
    assert!(matches!(err, ExtractError::Callback(_)));
    assert_eq!(calls, 2);
}

#[test]
fn check_stop_follows_every_interval() {
    let pts: Vec<Point3> = (0..10).map(|i| Point3::new(i as f64, 0.0, 1.0)).collect();
    let m = SurfaceModel::from_points(pts);
    let config = ExtractConfig {
        check_stop_interval: Some(2),
        ..ExtractConfig::default()
    };
    let mut kinds = Vec::new();
    let mut sink = sink_fn(|kind: FeatureKind, _tag: u64, _id: u64, _pts: &[Point3]| {
        kinds.push(kind);
        Ok(())
    });
    Extractor::with_config(&m, config)
        .extract(FeatureKind::Spots, 2, None, &mut sink)
        .unwrap();
    let stops = kinds.iter().filter(|k| **k == FeatureKind::CheckStop).count();
    assert_eq!(kinds.len(), 5 + stops);
    assert_eq!(stops, 2);
}

#[test]
fn features_by_tag_and_id() {
    let m = site();
    let mut c = Collector::new();
    let ex = Extractor::new(&m);
    ex.extract_by_user_tag(1, 0, None, &mut c).unwrap();
    assert_eq!(c.occurrences.len(), 1);
    assert_eq!(c.occurrences[0].kind, FeatureKind::Breakline);
    assert_eq!(c.occurrences[0].points.len(), 3);

    let mut by_id = Collector::new();
    ex.extract_by_feature_id(10, None, &mut by_id).unwrap();
    assert_eq!(by_id.occurrences, c.occurrences);
    let pulled: Vec<Occurrence> = ScanContext::for_feature_id(&m, 10, None).unwrap().collect();
    assert_eq!(pulled, by_id.occurrences);
}

#[test]
fn user_tag_pull_matches_bulk() {
    let m = site();
    let ex = Extractor::new(&m);
    let fences = [
        None,
        Some(shape_fence(FenceOption::Inside)),
        Some(shape_fence(FenceOption::Outside)),
    ];
    for tag in [1, 2] {
        for fence in &fences {
            let mut c = Collector::new();
            ex.extract_by_user_tag(tag, 1, fence.as_ref(), &mut c).unwrap();
            let pulled: Vec<Occurrence> = ScanContext::for_user_tag(&m, tag, 1, fence.as_ref())
                .unwrap()
                .collect();
            assert_eq!(pulled, c.occurrences, "tag {tag} with fence {fence:?}");
        }
    }
    // group spots come back one batch per step
    let spots: Vec<Occurrence> = ScanContext::for_user_tag(&m, 2, 1, None).unwrap().collect();
    assert_eq!(spots.len(), 2);
    assert!(spots.iter().all(|o| o.kind == FeatureKind::GroupSpots && o.feature_id == 20));
}
