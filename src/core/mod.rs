//! Core domain types: errors, configuration, span model, and the
//! ambient-context carrier boundary.

pub mod config;
pub mod context;
pub mod error;
pub mod types;

pub use config::{Config, ExportConfig, MetricsConfig};
pub use context::{ContextCarrier, ContextSlot, SpanContext};
pub use error::{Result, TracekitError};
pub use types::{
    FinishedSpan, SpanEvent, SpanId, SpanKind, SpanLink, SpanStatus, TraceId, Value,
};
