//! Exporter-facing snapshot types.
//!
//! A snapshot copies point state out of the live store; batches never
//! alias storage that subsequent updates mutate.

use crate::metrics::attributes::AttributeSet;
use crate::metrics::instrument::Temporality;
use std::time::SystemTime;

/// The value a metric point held at the snapshot instant.
#[derive(Debug, Clone, PartialEq)]
pub enum PointValue {
    /// Sum with a long accumulator
    LongSum(i64),
    /// Sum with a double accumulator
    DoubleSum(f64),
    /// Last observed long value
    LongGauge(i64),
    /// Last observed double value
    DoubleGauge(f64),
    /// Distribution snapshot; `bucket_counts` is empty for
    /// sum/count-only histograms, otherwise one longer than the
    /// boundary sequence (the final slot is the overflow bucket).
    Histogram {
        /// Number of recorded values
        count: u64,
        /// Sum of recorded values
        sum: f64,
        /// Per-bucket counts aligned with the boundaries
        bucket_counts: Vec<u64>,
    },
}

/// One time series as it stood at the snapshot instant.
#[derive(Debug, Clone)]
pub struct MetricPoint {
    /// Canonicalized identity of the series
    pub attributes: AttributeSet,
    /// Copied value
    pub value: PointValue,
}

/// An immutable, ordered collection of metric points produced by one
/// snapshot.
#[derive(Debug)]
pub struct MetricBatch {
    points: Vec<MetricPoint>,
    temporality: Temporality,
    at: SystemTime,
}

impl MetricBatch {
    pub(crate) fn new(points: Vec<MetricPoint>, temporality: Temporality) -> Self {
        Self {
            points,
            temporality,
            at: SystemTime::now(),
        }
    }

    pub(crate) fn empty(temporality: Temporality) -> Self {
        Self::new(Vec::new(), temporality)
    }

    /// The points as they stood at the snapshot instant.
    pub fn points(&self) -> &[MetricPoint] {
        &self.points
    }

    /// Temporality of the producing store.
    pub fn temporality(&self) -> Temporality {
        self.temporality
    }

    /// When the snapshot was taken.
    pub fn timestamp(&self) -> SystemTime {
        self.at
    }

    /// Number of points in the batch.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the snapshot saw no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates the points in snapshot order.
    pub fn iter(&self) -> std::slice::Iter<'_, MetricPoint> {
        self.points.iter()
    }
}

impl<'a> IntoIterator for &'a MetricBatch {
    type Item = &'a MetricPoint;
    type IntoIter = std::slice::Iter<'a, MetricPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
