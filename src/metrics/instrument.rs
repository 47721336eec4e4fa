//! Instrument identity and aggregation dispatch.
//!
//! The aggregation rule for a metric is decided exactly once, at metric
//! construction, from a static lookup over (instrument kind, numeric kind,
//! temporality). Nothing on the update path ever re-derives it.

use crate::core::error::{Result, TracekitError};
use serde::{Deserialize, Serialize};

/// Width of the values an instrument reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    /// Signed 64-bit integer measurements
    Long,
    /// 64-bit float measurements
    Double,
}

/// Whether reported values are increments since the last report or
/// running totals since start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Temporality {
    /// Accumulation since the previous snapshot; reset after each one
    Delta,
    /// Accumulation since instrument start; never reset
    Cumulative,
}

/// The kind of instrument a metric was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    /// Monotonic counter reporting increments
    Counter,
    /// Non-monotonic counter reporting increments
    UpDownCounter,
    /// Callback counter reporting absolute running totals
    ObservableCounter,
    /// Callback up-down counter reporting absolute running totals
    ObservableUpDownCounter,
    /// Callback gauge reporting point-in-time observations
    ObservableGauge,
    /// Distribution instrument
    Histogram,
}

impl InstrumentKind {
    /// True for callback instruments that report absolute totals rather
    /// than increments.
    pub fn reports_cumulative(&self) -> bool {
        matches!(
            self,
            InstrumentKind::ObservableCounter | InstrumentKind::ObservableUpDownCounter
        )
    }
}

/// Identifies a metric: immutable after creation.
#[derive(Debug, Clone)]
pub struct InstrumentDescriptor {
    name: String,
    description: String,
    unit: String,
    meter: String,
    numeric: NumericKind,
    kind: InstrumentKind,
}

impl InstrumentDescriptor {
    /// Creates a descriptor, validating the instrument name.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
        meter: impl Into<String>,
        numeric: NumericKind,
        kind: InstrumentKind,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(TracekitError::config("instrument name cannot be empty"));
        }
        if name.len() > 255 {
            return Err(TracekitError::config(
                "instrument name cannot exceed 255 characters",
            ));
        }
        Ok(Self {
            name,
            description: description.into(),
            unit: unit.into(),
            meter: meter.into(),
            numeric,
            kind,
        })
    }

    /// Metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Unit of the reported values.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Owning meter.
    pub fn meter(&self) -> &str {
        &self.meter
    }

    /// Width of reported values.
    pub fn numeric(&self) -> NumericKind {
        self.numeric
    }

    /// Instrument kind.
    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }
}

/// The closed set of update/reset rules applied to a metric's points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationType {
    /// Incoming increments, long accumulator
    LongSumDelta,
    /// Incoming absolute totals, long accumulator
    LongSumCumulative,
    /// Incoming increments, double accumulator
    DoubleSumDelta,
    /// Incoming absolute totals, double accumulator
    DoubleSumCumulative,
    /// Last observed long value
    LongGauge,
    /// Last observed double value
    DoubleGauge,
    /// Bucketed distribution with sum and count
    Histogram,
    /// Distribution reduced to sum and count only
    HistogramSumCountOnly,
}

impl AggregationType {
    /// Resolves the aggregation rule for an instrument. Returns `None`
    /// when no rule applies: observable instruments report absolute
    /// totals, and this core does not diff a cumulative stream down to
    /// deltas, so observable sums under Delta temporality are unmapped.
    pub fn resolve(
        kind: InstrumentKind,
        numeric: NumericKind,
        temporality: Temporality,
        sum_count_only: bool,
    ) -> Option<Self> {
        use AggregationType::*;
        use InstrumentKind::*;
        use NumericKind::*;

        match (kind, numeric) {
            (Counter | UpDownCounter, Long) => Some(LongSumDelta),
            (Counter | UpDownCounter, Double) => Some(DoubleSumDelta),
            (ObservableCounter | ObservableUpDownCounter, Long) => match temporality {
                Temporality::Cumulative => Some(LongSumCumulative),
                Temporality::Delta => None,
            },
            (ObservableCounter | ObservableUpDownCounter, Double) => match temporality {
                Temporality::Cumulative => Some(DoubleSumCumulative),
                Temporality::Delta => None,
            },
            (ObservableGauge, Long) => Some(LongGauge),
            (ObservableGauge, Double) => Some(DoubleGauge),
            (InstrumentKind::Histogram, _) => {
                if sum_count_only {
                    Some(HistogramSumCountOnly)
                } else {
                    Some(AggregationType::Histogram)
                }
            },
        }
    }

    /// True for sum aggregations.
    #[inline]
    pub fn is_sum(&self) -> bool {
        matches!(
            self,
            AggregationType::LongSumDelta
                | AggregationType::LongSumCumulative
                | AggregationType::DoubleSumDelta
                | AggregationType::DoubleSumCumulative
        )
    }

    /// True for gauge aggregations.
    #[inline]
    pub fn is_gauge(&self) -> bool {
        matches!(self, AggregationType::LongGauge | AggregationType::DoubleGauge)
    }

    /// True for histogram aggregations, bucketed or not.
    #[inline]
    pub fn is_histogram(&self) -> bool {
        matches!(
            self,
            AggregationType::Histogram | AggregationType::HistogramSumCountOnly
        )
    }

    /// True when the long-width accumulator carries the point value.
    #[inline]
    pub fn is_long(&self) -> bool {
        matches!(
            self,
            AggregationType::LongSumDelta
                | AggregationType::LongSumCumulative
                | AggregationType::LongGauge
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_maps_to_delta_sum() {
        let agg = AggregationType::resolve(
            InstrumentKind::Counter,
            NumericKind::Long,
            Temporality::Cumulative,
            false,
        );
        assert_eq!(agg, Some(AggregationType::LongSumDelta));
    }

    #[test]
    fn test_observable_counter_maps_to_cumulative_sum() {
        let agg = AggregationType::resolve(
            InstrumentKind::ObservableCounter,
            NumericKind::Double,
            Temporality::Cumulative,
            false,
        );
        assert_eq!(agg, Some(AggregationType::DoubleSumCumulative));
    }

    #[test]
    fn test_observable_sum_under_delta_is_unmapped() {
        let agg = AggregationType::resolve(
            InstrumentKind::ObservableCounter,
            NumericKind::Long,
            Temporality::Delta,
            false,
        );
        assert_eq!(agg, None);
    }

    #[test]
    fn test_gauge_maps_regardless_of_temporality() {
        for temporality in [Temporality::Delta, Temporality::Cumulative] {
            let agg = AggregationType::resolve(
                InstrumentKind::ObservableGauge,
                NumericKind::Long,
                temporality,
                false,
            );
            assert_eq!(agg, Some(AggregationType::LongGauge));
        }
    }

    #[test]
    fn test_histogram_variants() {
        let bucketed = AggregationType::resolve(
            InstrumentKind::Histogram,
            NumericKind::Double,
            Temporality::Delta,
            false,
        );
        assert_eq!(bucketed, Some(AggregationType::Histogram));

        let reduced = AggregationType::resolve(
            InstrumentKind::Histogram,
            NumericKind::Double,
            Temporality::Delta,
            true,
        );
        assert_eq!(reduced, Some(AggregationType::HistogramSumCountOnly));
    }

    #[test]
    fn test_kind_predicates() {
        assert!(AggregationType::LongSumDelta.is_sum());
        assert!(AggregationType::DoubleGauge.is_gauge());
        assert!(AggregationType::HistogramSumCountOnly.is_histogram());
        assert!(AggregationType::LongGauge.is_long());
        assert!(!AggregationType::DoubleSumDelta.is_long());
    }

    #[test]
    fn test_descriptor_validation() {
        assert!(InstrumentDescriptor::new(
            "",
            "",
            "ms",
            "svc",
            NumericKind::Long,
            InstrumentKind::Counter
        )
        .is_err());

        let descriptor = InstrumentDescriptor::new(
            "http.server.duration",
            "request latency",
            "ms",
            "http",
            NumericKind::Double,
            InstrumentKind::Histogram,
        )
        .unwrap();
        assert_eq!(descriptor.name(), "http.server.duration");
        assert_eq!(descriptor.kind(), InstrumentKind::Histogram);
    }
}
