//! The per-metric aggregation engine.
//!
//! Updates arrive from arbitrary concurrent call sites. Point lookup and
//! creation go through a sharded map; mutation and the snapshot copy are
//! serialized per point by one small mutex each. A snapshot therefore
//! never stops the world: at any instant at most one point is briefly
//! locked against its own updates.

use crate::core::error::{Result, TracekitError};
use crate::metrics::attributes::{AttributeSet, KeyValue};
use crate::metrics::instrument::{AggregationType, Temporality};
use crate::metrics::point::{MetricBatch, MetricPoint, PointValue};
use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Reserved attribute key marking the cardinality-overflow point.
pub const OVERFLOW_ATTRIBUTE_KEY: &str = "tracekit.overflow";

/// Validates histogram bucket boundaries: finite and strictly ascending.
/// An empty sequence is valid; it signals sum/count-only accounting.
pub(crate) fn validate_bounds(bounds: &[f64]) -> Result<()> {
    for window in bounds.windows(2) {
        if window[1] <= window[0] {
            return Err(TracekitError::config(format!(
                "histogram bounds must be strictly ascending: {} then {}",
                window[0], window[1]
            )));
        }
    }
    if let Some(bad) = bounds.iter().find(|b| !b.is_finite()) {
        return Err(TracekitError::config(format!(
            "histogram bounds must be finite, got {}",
            bad
        )));
    }
    Ok(())
}

/// Live accumulator state for one point. Gauge and cumulative-sum
/// aggregations share the scalar variants; which `PointValue` a scalar
/// becomes is decided by the store's aggregation type at snapshot time.
#[derive(Debug)]
enum Accumulator {
    Long(i64),
    Double(f64),
    Histogram {
        count: u64,
        sum: f64,
        buckets: Box<[u64]>,
    },
}

impl Accumulator {
    fn new(aggregation: AggregationType, bucket_count: usize) -> Self {
        match aggregation {
            AggregationType::LongSumDelta
            | AggregationType::LongSumCumulative
            | AggregationType::LongGauge => Accumulator::Long(0),
            AggregationType::DoubleSumDelta
            | AggregationType::DoubleSumCumulative
            | AggregationType::DoubleGauge => Accumulator::Double(0.0),
            AggregationType::Histogram => Accumulator::Histogram {
                count: 0,
                sum: 0.0,
                buckets: vec![0; bucket_count].into_boxed_slice(),
            },
            AggregationType::HistogramSumCountOnly => Accumulator::Histogram {
                count: 0,
                sum: 0.0,
                buckets: Box::new([]),
            },
        }
    }

    fn reset(&mut self) {
        match self {
            Accumulator::Long(v) => *v = 0,
            Accumulator::Double(v) => *v = 0.0,
            Accumulator::Histogram { count, sum, buckets } => {
                *count = 0;
                *sum = 0.0;
                buckets.fill(0);
            },
        }
    }
}

/// Per-metric store: records measurements against attribute-keyed points
/// and produces copy-on-snapshot batches.
pub struct AggregatorStore {
    aggregation: AggregationType,
    temporality: Temporality,
    bounds: Arc<[f64]>,
    interesting: Option<Arc<[Arc<str>]>>,
    cardinality_limit: Option<usize>,
    overflow_set: AttributeSet,
    points: DashMap<AttributeSet, Arc<Mutex<Accumulator>>, ahash::RandomState>,
    snapshot: ArcSwap<MetricBatch>,
}

impl AggregatorStore {
    /// Creates a store. `bounds` is ignored for non-histogram
    /// aggregations and must be strictly ascending and finite otherwise.
    pub fn new(
        aggregation: AggregationType,
        temporality: Temporality,
        bounds: &[f64],
        interesting: Option<Vec<Arc<str>>>,
        cardinality_limit: Option<usize>,
    ) -> Result<Self> {
        validate_bounds(bounds)?;
        let bounds: Arc<[f64]> = if aggregation == AggregationType::Histogram {
            bounds.into()
        } else {
            Arc::from(Vec::new())
        };
        Ok(Self {
            aggregation,
            temporality,
            bounds,
            interesting: interesting.map(Arc::from),
            cardinality_limit,
            overflow_set: AttributeSet::from_kvs(
                &[KeyValue::new(OVERFLOW_ATTRIBUTE_KEY, true)],
                None,
            ),
            points: DashMap::with_hasher(ahash::RandomState::new()),
            snapshot: ArcSwap::from_pointee(MetricBatch::empty(temporality)),
        })
    }

    /// The aggregation rule this store applies.
    pub fn aggregation(&self) -> AggregationType {
        self.aggregation
    }

    /// The reset rule this store applies at snapshot.
    pub fn temporality(&self) -> Temporality {
        self.temporality
    }

    /// Histogram bucket boundaries (empty for every other aggregation).
    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Number of distinct points currently tracked.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Records one long measurement against an attribute set.
    pub fn update_long(&self, value: i64, attrs: &[KeyValue]) {
        match self.aggregation {
            AggregationType::LongSumDelta => self.mutate(attrs, |acc| {
                if let Accumulator::Long(v) = acc {
                    *v = v.wrapping_add(value);
                }
            }),
            AggregationType::LongSumCumulative | AggregationType::LongGauge => {
                self.mutate(attrs, |acc| {
                    if let Accumulator::Long(v) = acc {
                        *v = value;
                    }
                })
            },
            AggregationType::DoubleSumDelta
            | AggregationType::DoubleSumCumulative
            | AggregationType::DoubleGauge
            | AggregationType::Histogram
            | AggregationType::HistogramSumCountOnly => self.update_double(value as f64, attrs),
        }
    }

    /// Records one double measurement against an attribute set.
    pub fn update_double(&self, value: f64, attrs: &[KeyValue]) {
        match self.aggregation {
            AggregationType::LongSumDelta
            | AggregationType::LongSumCumulative
            | AggregationType::LongGauge => self.update_long(value as i64, attrs),
            AggregationType::DoubleSumDelta => self.mutate(attrs, |acc| {
                if let Accumulator::Double(v) = acc {
                    *v += value;
                }
            }),
            AggregationType::DoubleSumCumulative | AggregationType::DoubleGauge => {
                self.mutate(attrs, |acc| {
                    if let Accumulator::Double(v) = acc {
                        *v = value;
                    }
                })
            },
            AggregationType::Histogram | AggregationType::HistogramSumCountOnly => {
                let bounds = Arc::clone(&self.bounds);
                self.mutate(attrs, move |acc| {
                    if let Accumulator::Histogram { count, sum, buckets } = acc {
                        *count += 1;
                        *sum += value;
                        if !buckets.is_empty() {
                            // First boundary satisfying value <= bound;
                            // past the end is the overflow bucket.
                            let idx = bounds.partition_point(|&b| b < value);
                            buckets[idx] += 1;
                        }
                    }
                })
            },
        }
    }

    /// Fixes the current state of every point as the exportable
    /// generation. Delta temporality resets sum and histogram
    /// accumulators afterwards; gauges always keep their last observed
    /// value.
    pub fn snapshot(&self) {
        let reset = self.temporality == Temporality::Delta && !self.aggregation.is_gauge();
        let mut points = Vec::with_capacity(self.points.len());
        for entry in self.points.iter() {
            let value = {
                let mut acc = entry.value().lock();
                let value = self.point_value(&acc);
                if reset {
                    acc.reset();
                }
                value
            };
            points.push(MetricPoint {
                attributes: entry.key().clone(),
                value,
            });
        }
        tracing::debug!(points = points.len(), "metric snapshot taken");
        self.snapshot
            .store(Arc::new(MetricBatch::new(points, self.temporality)));
    }

    /// The batch produced by the most recent snapshot.
    pub fn points(&self) -> Arc<MetricBatch> {
        self.snapshot.load_full()
    }

    fn point_value(&self, acc: &Accumulator) -> PointValue {
        match (acc, self.aggregation) {
            (Accumulator::Long(v), agg) if agg.is_gauge() => PointValue::LongGauge(*v),
            (Accumulator::Long(v), _) => PointValue::LongSum(*v),
            (Accumulator::Double(v), agg) if agg.is_gauge() => PointValue::DoubleGauge(*v),
            (Accumulator::Double(v), _) => PointValue::DoubleSum(*v),
            (Accumulator::Histogram { count, sum, buckets }, _) => PointValue::Histogram {
                count: *count,
                sum: *sum,
                bucket_counts: buckets.to_vec(),
            },
        }
    }

    fn mutate<F: FnOnce(&mut Accumulator)>(&self, attrs: &[KeyValue], apply: F) {
        let set = AttributeSet::from_kvs(attrs, self.interesting.as_deref());
        let handle = self.point_handle(set);
        let mut acc = handle.lock();
        apply(&mut acc);
    }

    fn point_handle(&self, set: AttributeSet) -> Arc<Mutex<Accumulator>> {
        if let Some(existing) = self.points.get(&set) {
            return Arc::clone(existing.value());
        }

        // The limit is advisory under races: two first-seen sets may slip
        // past it together, which is acceptable for an exhaustion guard.
        let key = match self.cardinality_limit {
            Some(limit) if self.points.len() >= limit && set != self.overflow_set => {
                tracing::warn!(limit, "metric cardinality limit reached, routing to overflow point");
                self.overflow_set.clone()
            },
            _ => set,
        };

        let bucket_count = self.bounds.len() + 1;
        Arc::clone(
            self.points
                .entry(key)
                .or_insert_with(|| {
                    Arc::new(Mutex::new(Accumulator::new(self.aggregation, bucket_count)))
                })
                .value(),
        )
    }
}
