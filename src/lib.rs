//! Tracekit - in-process telemetry core.
//!
//! Tracekit is the aggregation and encoding heart of an observability
//! SDK: it turns raw measurement calls into periodically-snapshotted,
//! export-ready metric batches, and finished spans into a
//! length-prefixed binary wire encoding for a Jaeger-compatible tracing
//! backend.
//!
//! # Features
//!
//! - **Concurrent Aggregation**: attribute-keyed metric points with
//!   per-point locking; snapshots never stop the world
//! - **Delta and Cumulative Temporality**: reset rules applied per
//!   metric, decided once at creation
//! - **Zero-Alloc Encoding**: span records borrow child buffers from
//!   shared pools and return them after each encode
//! - **Fail-Fast Guards**: recursion depth limits and pool misuse
//!   checks surface as errors, never as corruption
//!
//! # Architecture
//!
//! - `metrics`: aggregation stores, metric registry, snapshot batches
//! - `export`: buffer pools, binary protocol, wire records, span mapping
//! - `core`: errors, configuration, span model, context carrier
//!
//! # Example
//!
//! ```
//! use tracekit::metrics::{InstrumentDescriptor, InstrumentKind, KeyValue, MetricRegistry, NumericKind};
//!
//! # fn main() -> tracekit::Result<()> {
//! let registry = MetricRegistry::default();
//! let requests = registry.register(InstrumentDescriptor::new(
//!     "http.server.requests",
//!     "completed requests",
//!     "1",
//!     "http",
//!     NumericKind::Long,
//!     InstrumentKind::Counter,
//! )?)?;
//!
//! requests.update_long(1, &[KeyValue::new("route", "/users")]);
//! let batches = registry.collect();
//! assert_eq!(batches[0].1.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod core;
pub mod export;
pub mod metrics;

// Re-export core types for convenience
pub use crate::core::{Config, Result, TracekitError};
