//! Delivery of extracted point batches to the caller.

use log::trace;

use crate::error::{ExtractError, Result, SinkError};
use crate::geometry::Point3;
use crate::model::{FeatureKind, NULL_FEATURE_ID, NULL_USER_TAG};

/// Receiver of extracted occurrences.
///
/// Returning an error aborts the remaining enumeration of the current call;
/// the error is handed back as [`ExtractError::Callback`].
pub trait FeatureSink {
    fn deliver(
        &mut self,
        kind: FeatureKind,
        user_tag: u64,
        feature_id: u64,
        points: &[Point3],
    ) -> std::result::Result<(), SinkError>;
}

/// Adapter turning a closure into a [`FeatureSink`].
pub struct FnSink<F>(F);

/// Wraps a closure as a sink.
pub fn sink_fn<F>(f: F) -> FnSink<F>
where
    F: FnMut(FeatureKind, u64, u64, &[Point3]) -> std::result::Result<(), SinkError>,
{
    FnSink(f)
}

impl<F> FeatureSink for FnSink<F>
where
    F: FnMut(FeatureKind, u64, u64, &[Point3]) -> std::result::Result<(), SinkError>,
{
    fn deliver(
        &mut self,
        kind: FeatureKind,
        user_tag: u64,
        feature_id: u64,
        points: &[Point3],
    ) -> std::result::Result<(), SinkError> {
        (self.0)(kind, user_tag, feature_id, points)
    }
}

/// One delivered batch, occurrence or split piece.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Occurrence {
    pub kind: FeatureKind,
    pub user_tag: u64,
    pub feature_id: u64,
    pub points: Vec<Point3>,
}

/// Sink that keeps every occurrence in memory. Check-stop sentinels are not
/// recorded.
#[derive(Debug, Default)]
pub struct Collector {
    pub occurrences: Vec<Occurrence>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of delivered points.
    pub fn point_count(&self) -> usize {
        self.occurrences.iter().map(|o| o.points.len()).sum()
    }
}

impl FeatureSink for Collector {
    fn deliver(
        &mut self,
        kind: FeatureKind,
        user_tag: u64,
        feature_id: u64,
        points: &[Point3],
    ) -> std::result::Result<(), SinkError> {
        if kind != FeatureKind::CheckStop {
            self.occurrences.push(Occurrence {
                kind,
                user_tag,
                feature_id,
                points: points.to_vec(),
            });
        }
        Ok(())
    }
}

/// Wraps the caller's sink for one extraction call.
pub(crate) struct Bridge<'s> {
    sink: &'s mut dyn FeatureSink,
    check_stop_interval: Option<usize>,
    delivered: usize,
}

impl<'s> Bridge<'s> {
    pub(crate) fn new(sink: &'s mut dyn FeatureSink, check_stop_interval: Option<usize>) -> Self {
        Self {
            sink,
            check_stop_interval: check_stop_interval.filter(|n| *n > 0),
            delivered: 0,
        }
    }

    /// Hands one batch to the sink. Empty batches are dropped.
    pub(crate) fn deliver(
        &mut self,
        kind: FeatureKind,
        user_tag: u64,
        feature_id: u64,
        points: &[Point3],
    ) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        trace!("deliver {kind:?} tag {user_tag} id {feature_id}: {} points", points.len());
        self.sink
            .deliver(kind, user_tag, feature_id, points)
            .map_err(ExtractError::Callback)?;
        self.delivered += 1;
        if let Some(n) = self.check_stop_interval {
            if self.delivered % n == 0 {
                self.check_stop()?;
            }
        }
        Ok(())
    }

    /// Sends the zero point check-stop sentinel.
    pub(crate) fn check_stop(&mut self) -> Result<()> {
        self.sink
            .deliver(FeatureKind::CheckStop, NULL_USER_TAG, NULL_FEATURE_ID, &[])
            .map_err(ExtractError::Callback)
    }

    pub(crate) fn delivered(&self) -> usize {
        self.delivered
    }
}

/// Accumulates points and flushes them whenever `max` is reached.
pub(crate) struct PointBatch {
    kind: FeatureKind,
    user_tag: u64,
    feature_id: u64,
    max: usize,
    points: Vec<Point3>,
}

impl PointBatch {
    pub(crate) fn new(kind: FeatureKind, user_tag: u64, feature_id: u64, max: usize) -> Self {
        let max = max.max(1);
        Self {
            kind,
            user_tag,
            feature_id,
            max,
            points: Vec::with_capacity(max.min(4096)),
        }
    }

    pub(crate) fn push(&mut self, p: Point3, bridge: &mut Bridge<'_>) -> Result<()> {
        self.points.push(p);
        if self.points.len() >= self.max {
            self.flush(bridge)?;
        }
        Ok(())
    }

    pub(crate) fn flush(&mut self, bridge: &mut Bridge<'_>) -> Result<()> {
        if self.points.is_empty() {
            return Ok(());
        }
        let result = bridge.deliver(self.kind, self.user_tag, self.feature_id, &self.points);
        self.points.clear();
        result
    }
}
