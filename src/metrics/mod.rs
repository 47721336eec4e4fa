//! The in-process metrics pipeline.
//!
//! Instrument calls land in per-metric aggregation stores keyed by
//! canonicalized attribute sets; periodic snapshots copy point state
//! into immutable batches for an exporter. Aggregation rules are
//! resolved once at metric creation and never re-derived on the update
//! path.

pub mod attributes;
pub mod instrument;
pub mod metric;
pub mod point;
pub mod store;

pub use attributes::{AttrValue, AttributeSet, KeyValue};
pub use instrument::{
    AggregationType, InstrumentDescriptor, InstrumentKind, NumericKind, Temporality,
};
pub use metric::{Metric, MetricOptions, MetricRegistry, DEFAULT_HISTOGRAM_BOUNDS};
pub use point::{MetricBatch, MetricPoint, PointValue};
pub use store::{AggregatorStore, OVERFLOW_ATTRIBUTE_KEY};

use crate::core::error::Result;
use std::sync::Arc;

/// Receives collected metric batches for off-process transport. The
/// pipeline's obligation ends when `export` returns.
pub trait MetricsSink: Send + Sync {
    /// Accepts one metric's batch from a collection cycle.
    fn export(&self, metric: &Metric, batch: Arc<MetricBatch>) -> Result<()>;
}
