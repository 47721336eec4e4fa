//! Span export: pooled record buffers, binary protocol encoding, and
//! the mapping from finished spans to wire records.
//!
//! The hot path performs no incremental heap allocation: record child
//! collections live in buffers borrowed from shared pools and go back
//! after each span is encoded.

pub mod mapper;
pub mod pool;
pub mod protocol;
pub mod records;

pub use mapper::{export_span, map_span, map_span_with_context};
pub use pool::{ArrayPool, PooledList, DEFAULT_POOL_RETAIN};
pub use protocol::{BinaryProtocol, FieldType, Protocol, DEFAULT_RECURSION_LIMIT};
pub use records::{LogRecord, RecordPools, SpanRecord, SpanRefKind, SpanRefRecord, TagRecord};

use crate::core::error::Result;
use bytes::Bytes;

/// Receives encoded spans for off-process transport. The core's
/// obligation ends when `consume` returns.
pub trait SpanSink: Send + Sync {
    /// Accepts one encoded span.
    fn consume(&self, encoded: Bytes) -> Result<()>;
}
