//! Export record types mirroring the tracing backend's wire schema.
//!
//! Each record writes itself through a [`Protocol`] with a fixed,
//! numbered field layout, always in ascending field-ID order. Optional
//! collection fields are omitted entirely when empty; decoders treat a
//! missing field ID as "use default". Child collections live in pooled
//! buffers that the span releases exactly once after encoding.

use crate::core::error::Result;
use crate::core::types::Value;
use crate::export::pool::{ArrayPool, PooledList, DEFAULT_POOL_RETAIN};
use crate::export::protocol::{FieldType, Protocol};
use std::sync::Arc;

/// Causality of a span reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanRefKind {
    /// The referenced span is the parent
    ChildOf,
    /// The referenced span happened before, without parentage
    FollowsFrom,
}

impl SpanRefKind {
    /// The wire enum value.
    pub fn code(self) -> i32 {
        match self {
            SpanRefKind::ChildOf => 0,
            SpanRefKind::FollowsFrom => 1,
        }
    }
}

/// Wire discriminant for a tag's populated value slot.
fn value_type_code(value: &Value) -> i32 {
    match value {
        Value::Str(_) => 0,
        Value::Double(_) => 1,
        Value::Bool(_) => 2,
        Value::Long(_) => 3,
        Value::Binary(_) => 4,
    }
}

/// A key plus exactly one typed value. The sum type makes a tag with
/// zero or two populated slots unrepresentable, so nothing is
/// re-validated at write time.
#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    /// Tag key
    pub key: String,
    /// The single populated value slot
    pub value: Value,
}

impl TagRecord {
    /// Creates a tag.
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Renders the tag through the encoder.
    pub fn write<P: Protocol>(&self, prot: &mut P) -> Result<()> {
        prot.enter_recursion()?;
        let result = self.write_fields(prot);
        prot.exit_recursion();
        result
    }

    fn write_fields<P: Protocol>(&self, prot: &mut P) -> Result<()> {
        prot.write_struct_begin("Tag")?;

        prot.write_field_begin("key", FieldType::String, 1)?;
        prot.write_string(&self.key)?;
        prot.write_field_end()?;

        prot.write_field_begin("vType", FieldType::I32, 2)?;
        prot.write_i32(value_type_code(&self.value))?;
        prot.write_field_end()?;

        match &self.value {
            Value::Str(s) => {
                prot.write_field_begin("vStr", FieldType::String, 3)?;
                prot.write_string(s)?;
                prot.write_field_end()?;
            },
            Value::Double(d) => {
                prot.write_field_begin("vDouble", FieldType::Double, 4)?;
                prot.write_double(*d)?;
                prot.write_field_end()?;
            },
            Value::Bool(b) => {
                prot.write_field_begin("vBool", FieldType::Bool, 5)?;
                prot.write_bool(*b)?;
                prot.write_field_end()?;
            },
            Value::Long(v) => {
                prot.write_field_begin("vLong", FieldType::I64, 6)?;
                prot.write_i64(*v)?;
                prot.write_field_end()?;
            },
            Value::Binary(bytes) => {
                prot.write_field_begin("vBinary", FieldType::String, 7)?;
                prot.write_binary(bytes)?;
                prot.write_field_end()?;
            },
        }

        prot.write_field_stop()?;
        prot.write_struct_end()
    }
}

/// A causal reference to another span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanRefRecord {
    /// Kind of causality
    pub ref_type: SpanRefKind,
    /// Low 64 bits of the referenced trace id
    pub trace_id_low: i64,
    /// High 64 bits of the referenced trace id
    pub trace_id_high: i64,
    /// The referenced span id
    pub span_id: i64,
}

impl SpanRefRecord {
    /// Renders the reference through the encoder.
    pub fn write<P: Protocol>(&self, prot: &mut P) -> Result<()> {
        prot.enter_recursion()?;
        let result = self.write_fields(prot);
        prot.exit_recursion();
        result
    }

    fn write_fields<P: Protocol>(&self, prot: &mut P) -> Result<()> {
        prot.write_struct_begin("SpanRef")?;

        prot.write_field_begin("refType", FieldType::I32, 1)?;
        prot.write_i32(self.ref_type.code())?;
        prot.write_field_end()?;

        prot.write_field_begin("traceIdLow", FieldType::I64, 2)?;
        prot.write_i64(self.trace_id_low)?;
        prot.write_field_end()?;

        prot.write_field_begin("traceIdHigh", FieldType::I64, 3)?;
        prot.write_i64(self.trace_id_high)?;
        prot.write_field_end()?;

        prot.write_field_begin("spanId", FieldType::I64, 4)?;
        prot.write_i64(self.span_id)?;
        prot.write_field_end()?;

        prot.write_field_stop()?;
        prot.write_struct_end()
    }
}

/// A timestamped set of tag fields recorded during a span.
#[derive(Debug)]
pub struct LogRecord {
    /// Microseconds since the Unix epoch
    pub timestamp: i64,
    /// Log fields
    pub fields: PooledList<TagRecord>,
}

impl LogRecord {
    /// Renders the log through the encoder.
    pub fn write<P: Protocol>(&self, prot: &mut P) -> Result<()> {
        prot.enter_recursion()?;
        let result = self.write_fields(prot);
        prot.exit_recursion();
        result
    }

    fn write_fields<P: Protocol>(&self, prot: &mut P) -> Result<()> {
        prot.write_struct_begin("Log")?;

        prot.write_field_begin("timestamp", FieldType::I64, 1)?;
        prot.write_i64(self.timestamp)?;
        prot.write_field_end()?;

        prot.write_field_begin("fields", FieldType::List, 2)?;
        prot.write_list_begin(FieldType::Struct, self.fields.len())?;
        for field in &self.fields {
            field.write(prot)?;
        }
        prot.write_list_end()?;
        prot.write_field_end()?;

        prot.write_field_stop()?;
        prot.write_struct_end()
    }
}

/// A span as the tracing backend's wire schema lays it out.
#[derive(Debug)]
pub struct SpanRecord {
    /// Low 64 bits of the trace id
    pub trace_id_low: i64,
    /// High 64 bits of the trace id
    pub trace_id_high: i64,
    /// Span id
    pub span_id: i64,
    /// Parent span id, zero for roots
    pub parent_span_id: i64,
    /// Operation name
    pub operation_name: String,
    /// References to other spans
    pub references: PooledList<SpanRefRecord>,
    /// Trace flags
    pub flags: i32,
    /// Start time, microseconds since the Unix epoch
    pub start_time: i64,
    /// Duration in microseconds
    pub duration: i64,
    /// Span tags
    pub tags: PooledList<TagRecord>,
    /// Span logs
    pub logs: PooledList<LogRecord>,
}

impl SpanRecord {
    /// Renders the span through the encoder. Field IDs are written in
    /// strictly ascending order; empty collections are omitted.
    pub fn write<P: Protocol>(&self, prot: &mut P) -> Result<()> {
        prot.enter_recursion()?;
        let result = self.write_fields(prot);
        prot.exit_recursion();
        result
    }

    fn write_fields<P: Protocol>(&self, prot: &mut P) -> Result<()> {
        prot.write_struct_begin("Span")?;

        prot.write_field_begin("traceIdLow", FieldType::I64, 1)?;
        prot.write_i64(self.trace_id_low)?;
        prot.write_field_end()?;

        prot.write_field_begin("traceIdHigh", FieldType::I64, 2)?;
        prot.write_i64(self.trace_id_high)?;
        prot.write_field_end()?;

        prot.write_field_begin("spanId", FieldType::I64, 3)?;
        prot.write_i64(self.span_id)?;
        prot.write_field_end()?;

        prot.write_field_begin("parentSpanId", FieldType::I64, 4)?;
        prot.write_i64(self.parent_span_id)?;
        prot.write_field_end()?;

        prot.write_field_begin("operationName", FieldType::String, 5)?;
        prot.write_string(&self.operation_name)?;
        prot.write_field_end()?;

        if !self.references.is_empty() {
            prot.write_field_begin("references", FieldType::List, 6)?;
            prot.write_list_begin(FieldType::Struct, self.references.len())?;
            for reference in &self.references {
                reference.write(prot)?;
            }
            prot.write_list_end()?;
            prot.write_field_end()?;
        }

        prot.write_field_begin("flags", FieldType::I32, 7)?;
        prot.write_i32(self.flags)?;
        prot.write_field_end()?;

        prot.write_field_begin("startTime", FieldType::I64, 8)?;
        prot.write_i64(self.start_time)?;
        prot.write_field_end()?;

        prot.write_field_begin("duration", FieldType::I64, 9)?;
        prot.write_i64(self.duration)?;
        prot.write_field_end()?;

        if !self.tags.is_empty() {
            prot.write_field_begin("tags", FieldType::List, 10)?;
            prot.write_list_begin(FieldType::Struct, self.tags.len())?;
            for tag in &self.tags {
                tag.write(prot)?;
            }
            prot.write_list_end()?;
            prot.write_field_end()?;
        }

        if !self.logs.is_empty() {
            prot.write_field_begin("logs", FieldType::List, 11)?;
            prot.write_list_begin(FieldType::Struct, self.logs.len())?;
            for log in &self.logs {
                log.write(prot)?;
            }
            prot.write_list_end()?;
            prot.write_field_end()?;
        }

        prot.write_field_stop()?;
        prot.write_struct_end()
    }

    /// Returns every owned buffer to its pool, including the fields
    /// buffer inside each contained log. Must be called exactly once.
    pub fn release(&mut self) -> Result<()> {
        self.references.release()?;
        self.tags.release()?;
        for log in self.logs.as_mut_slice() {
            log.fields.release()?;
        }
        self.logs.release()
    }
}

/// The pools a span's child collections borrow from: one per element
/// type, injected wherever records are built. Process-lifetime scope is
/// whoever owns the bundle; there is no hidden global instance.
pub struct RecordPools {
    tags: Arc<ArrayPool<TagRecord>>,
    logs: Arc<ArrayPool<LogRecord>>,
    references: Arc<ArrayPool<SpanRefRecord>>,
}

impl RecordPools {
    /// Creates pools retaining up to `retain` free buffers each.
    pub fn new(retain: usize) -> Self {
        Self {
            tags: Arc::new(ArrayPool::new(retain)),
            logs: Arc::new(ArrayPool::new(retain)),
            references: Arc::new(ArrayPool::new(retain)),
        }
    }

    /// Creates pools sized from the export configuration.
    pub fn from_config(config: &crate::core::config::ExportConfig) -> Self {
        Self::new(config.pool_retain)
    }

    /// Borrows a tag buffer.
    pub fn tag_list(&self) -> PooledList<TagRecord> {
        PooledList::create(&self.tags)
    }

    /// Borrows a log buffer.
    pub fn log_list(&self) -> PooledList<LogRecord> {
        PooledList::create(&self.logs)
    }

    /// Borrows a span-reference buffer.
    pub fn reference_list(&self) -> PooledList<SpanRefRecord> {
        PooledList::create(&self.references)
    }

    /// Free tag buffers currently pooled.
    pub fn available_tag_buffers(&self) -> usize {
        self.tags.available()
    }
}

impl Default for RecordPools {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_RETAIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::TracekitError;
    use crate::export::protocol::BinaryProtocol;
    use bytes::BytesMut;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|window| window == needle)
    }

    fn encode<F: FnOnce(&mut BinaryProtocol<BytesMut>) -> Result<()>>(f: F) -> BytesMut {
        let mut prot = BinaryProtocol::new(BytesMut::new());
        f(&mut prot).unwrap();
        prot.into_inner()
    }

    fn sample_span(pools: &RecordPools) -> SpanRecord {
        SpanRecord {
            trace_id_low: 2,
            trace_id_high: 1,
            span_id: 3,
            parent_span_id: 0,
            operation_name: "GET /users".to_owned(),
            references: pools.reference_list(),
            flags: 1,
            start_time: 1_700_000_000_000_000,
            duration: 1500,
            tags: pools.tag_list(),
            logs: pools.log_list(),
        }
    }

    #[test]
    fn test_long_tag_writes_only_vlong() {
        let bytes = encode(|prot| TagRecord::new("count", 7i64).write(prot));

        // vType = LONG
        assert!(contains(&bytes, &[8, 0, 2, 0, 0, 0, 3]));
        // vLong field carries the value
        assert!(contains(&bytes, &[10, 0, 6, 0, 0, 0, 0, 0, 0, 0, 7]));
        // no other value slot is present
        assert!(!contains(&bytes, &[11, 0, 3]));
        assert!(!contains(&bytes, &[4, 0, 4]));
        assert!(!contains(&bytes, &[2, 0, 5]));
        assert!(!contains(&bytes, &[11, 0, 7]));
    }

    #[test]
    fn test_string_tag_layout() {
        let bytes = encode(|prot| TagRecord::new("k", "v").write(prot));
        assert_eq!(
            &bytes[..],
            &[
                11, 0, 1, 0, 0, 0, 1, b'k', // key
                8, 0, 2, 0, 0, 0, 0, // vType = STRING
                11, 0, 3, 0, 0, 0, 1, b'v', // vStr
                0, // stop
            ]
        );
    }

    #[test]
    fn test_binary_tag_uses_string_wire_type() {
        let bytes = encode(|prot| TagRecord::new("blob", vec![0xDEu8, 0xAD]).write(prot));
        assert!(contains(&bytes, &[8, 0, 2, 0, 0, 0, 4]));
        assert!(contains(&bytes, &[11, 0, 7, 0, 0, 0, 2, 0xDE, 0xAD]));
    }

    #[test]
    fn test_span_ref_exact_layout() {
        let record = SpanRefRecord {
            ref_type: SpanRefKind::FollowsFrom,
            trace_id_low: 2,
            trace_id_high: 1,
            span_id: 9,
        };
        let bytes = encode(|prot| record.write(prot));
        assert_eq!(
            &bytes[..],
            &[
                8, 0, 1, 0, 0, 0, 1, // refType = FOLLOWS_FROM
                10, 0, 2, 0, 0, 0, 0, 0, 0, 0, 2, // traceIdLow
                10, 0, 3, 0, 0, 0, 0, 0, 0, 0, 1, // traceIdHigh
                10, 0, 4, 0, 0, 0, 0, 0, 0, 0, 9, // spanId
                0, // stop
            ]
        );
    }

    #[test]
    fn test_empty_tags_field_omitted() {
        let pools = RecordPools::new(8);
        let mut span = sample_span(&pools);
        let bytes = encode(|prot| span.write(prot));
        span.release().unwrap();

        // no tags field (ID 10), no references (6), no logs (11)
        assert!(!contains(&bytes, &[15, 0, 10]));
        assert!(!contains(&bytes, &[15, 0, 6]));
        assert!(!contains(&bytes, &[15, 0, 11]));
        // mandatory fields still present
        assert!(contains(&bytes, &[10, 0, 1]));
        assert!(contains(&bytes, &[8, 0, 7]));
    }

    #[test]
    fn test_non_empty_tags_field_present() {
        let pools = RecordPools::new(8);
        let mut span = sample_span(&pools);
        span.tags.push(TagRecord::new("http.status_code", 200i64));
        let bytes = encode(|prot| span.write(prot));
        span.release().unwrap();

        assert!(contains(&bytes, &[15, 0, 10, 12, 0, 0, 0, 1]));
    }

    #[test]
    fn test_log_always_writes_fields_list() {
        let pools = RecordPools::new(8);
        let mut fields = pools.tag_list();
        fields.push(TagRecord::new("event", "retry"));
        let log = LogRecord {
            timestamp: 42,
            fields,
        };
        let bytes = encode(|prot| log.write(prot));

        assert!(contains(&bytes, &[10, 0, 1, 0, 0, 0, 0, 0, 0, 0, 42]));
        assert!(contains(&bytes, &[15, 0, 2, 12, 0, 0, 0, 1]));
    }

    #[test]
    fn test_release_returns_nested_buffers() {
        let pools = RecordPools::new(8);
        let mut span = sample_span(&pools);
        let mut fields = pools.tag_list();
        fields.push(TagRecord::new("event", "flush"));
        span.logs.push(LogRecord {
            timestamp: 1,
            fields,
        });

        span.release().unwrap();
        // span tags buffer + the log's fields buffer
        assert_eq!(pools.available_tag_buffers(), 2);
    }

    #[test]
    fn test_double_release_is_pool_misuse() {
        let pools = RecordPools::new(8);
        let mut span = sample_span(&pools);
        span.release().unwrap();
        let err = span.release().unwrap_err();
        assert!(matches!(err, TracekitError::PoolMisuse(_)));
    }

    #[test]
    fn test_depth_failure_unwinds_counter() {
        let pools = RecordPools::new(8);
        let mut span = sample_span(&pools);
        let mut fields = pools.tag_list();
        fields.push(TagRecord::new("event", "deep"));
        span.logs.push(LogRecord {
            timestamp: 1,
            fields,
        });

        // span (1) -> log (2) -> tag (3) exceeds a limit of 2
        let mut prot = BinaryProtocol::with_recursion_limit(BytesMut::new(), 2);
        let err = span.write(&mut prot).unwrap_err();
        assert!(matches!(err, TracekitError::DepthLimitExceeded { limit: 2 }));
        assert_eq!(prot.depth(), 0);

        span.release().unwrap();
    }
}
