//! A metric: one instrument bound to one aggregation store.

use crate::core::config::MetricsConfig;
use crate::core::error::{Result, TracekitError};
use crate::metrics::attributes::KeyValue;
use crate::metrics::instrument::{AggregationType, InstrumentDescriptor, Temporality};
use crate::metrics::point::MetricBatch;
use crate::metrics::store::AggregatorStore;
use crate::metrics::MetricsSink;
use dashmap::DashMap;
use std::sync::Arc;

/// Bucket boundaries applied to histogram instruments that do not
/// configure their own.
pub const DEFAULT_HISTOGRAM_BOUNDS: [f64; 10] =
    [0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 1000.0];

/// Per-metric configuration beyond the descriptor.
#[derive(Debug, Clone, Default)]
pub struct MetricOptions {
    /// Histogram bucket boundaries. `None` applies the defaults; an
    /// explicit empty vector keeps sum and count only.
    pub histogram_bounds: Option<Vec<f64>>,
    /// Restrict point identity to these attribute keys.
    pub interesting_keys: Option<Vec<Arc<str>>>,
    /// Route never-seen attribute sets past this many points to the
    /// overflow point.
    pub cardinality_limit: Option<usize>,
}

/// A metric owns exactly one aggregation store. Identity, aggregation
/// type, and temporality are fixed at creation.
pub struct Metric {
    descriptor: InstrumentDescriptor,
    store: AggregatorStore,
}

impl std::fmt::Debug for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.descriptor.name())
            .field("aggregation", &self.store.aggregation())
            .field("temporality", &self.store.temporality())
            .finish()
    }
}

impl Metric {
    /// Creates a metric, resolving the aggregation rule once from the
    /// descriptor and temporality.
    pub fn new(
        descriptor: InstrumentDescriptor,
        temporality: Temporality,
        options: MetricOptions,
    ) -> Result<Self> {
        let sum_count_only = matches!(&options.histogram_bounds, Some(b) if b.is_empty());
        let aggregation = AggregationType::resolve(
            descriptor.kind(),
            descriptor.numeric(),
            temporality,
            sum_count_only,
        )
        .ok_or_else(|| {
            TracekitError::UnknownAggregationType(format!(
                "{} ({:?}/{:?}, {:?} temporality)",
                descriptor.name(),
                descriptor.kind(),
                descriptor.numeric(),
                temporality
            ))
        })?;

        let bounds: &[f64] = match &options.histogram_bounds {
            Some(bounds) => bounds,
            None => &DEFAULT_HISTOGRAM_BOUNDS,
        };
        let store = AggregatorStore::new(
            aggregation,
            temporality,
            bounds,
            options.interesting_keys,
            options.cardinality_limit,
        )?;

        Ok(Self { descriptor, store })
    }

    /// Metric name.
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// The full instrument descriptor.
    pub fn descriptor(&self) -> &InstrumentDescriptor {
        &self.descriptor
    }

    /// The aggregation rule resolved at creation.
    pub fn aggregation(&self) -> AggregationType {
        self.store.aggregation()
    }

    /// The reset rule applied at snapshot.
    pub fn temporality(&self) -> Temporality {
        self.store.temporality()
    }

    /// Histogram bucket boundaries (empty for non-histogram metrics).
    pub fn bounds(&self) -> &[f64] {
        self.store.bounds()
    }

    /// Records one long measurement.
    #[inline]
    pub fn update_long(&self, value: i64, attrs: &[KeyValue]) {
        self.store.update_long(value, attrs);
    }

    /// Records one double measurement.
    #[inline]
    pub fn update_double(&self, value: f64, attrs: &[KeyValue]) {
        self.store.update_double(value, attrs);
    }

    /// Advances bookkeeping and fixes the exportable generation.
    pub fn snapshot(&self) {
        self.store.snapshot();
    }

    /// The batch produced by the most recent snapshot.
    pub fn points(&self) -> Arc<MetricBatch> {
        self.store.points()
    }
}

/// Thin registration surface: creates metrics from descriptors with the
/// configured defaults and drives collection across all of them.
pub struct MetricRegistry {
    metrics: DashMap<String, Arc<Metric>, ahash::RandomState>,
    config: MetricsConfig,
}

impl MetricRegistry {
    /// Creates a registry applying `config` defaults to new metrics.
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            metrics: DashMap::with_hasher(ahash::RandomState::new()),
            config,
        }
    }

    /// Registers a metric with default options.
    pub fn register(&self, descriptor: InstrumentDescriptor) -> Result<Arc<Metric>> {
        self.register_with(descriptor, MetricOptions::default())
    }

    /// Registers a metric, filling unset options from the registry
    /// configuration. Re-registering a name is a configuration defect.
    pub fn register_with(
        &self,
        descriptor: InstrumentDescriptor,
        mut options: MetricOptions,
    ) -> Result<Arc<Metric>> {
        if options.histogram_bounds.is_none() {
            options.histogram_bounds = Some(self.config.default_histogram_bounds.clone());
        }
        if options.cardinality_limit.is_none() {
            options.cardinality_limit = self.config.cardinality_limit;
        }

        let name = descriptor.name().to_owned();
        match self.metrics.entry(name) {
            dashmap::mapref::entry::Entry::Occupied(entry) => Err(TracekitError::config(format!(
                "metric already registered: '{}'",
                entry.key()
            ))),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let metric = Arc::new(Metric::new(
                    descriptor,
                    self.config.temporality,
                    options,
                )?);
                tracing::debug!(name = metric.name(), "registered metric");
                entry.insert(Arc::clone(&metric));
                Ok(metric)
            },
        }
    }

    /// Looks up a registered metric by name.
    pub fn get(&self, name: &str) -> Option<Arc<Metric>> {
        self.metrics.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of registered metrics.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Snapshots every metric and returns the fresh batches.
    pub fn collect(&self) -> Vec<(Arc<Metric>, Arc<MetricBatch>)> {
        let mut out = Vec::with_capacity(self.metrics.len());
        for entry in self.metrics.iter() {
            let metric = entry.value();
            metric.snapshot();
            out.push((Arc::clone(metric), metric.points()));
        }
        out
    }

    /// Snapshots every metric and hands the batches to `sink`.
    pub fn collect_into(&self, sink: &dyn MetricsSink) -> Result<()> {
        for (metric, batch) in self.collect() {
            sink.export(&metric, batch)?;
        }
        Ok(())
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}
