//! Maps finished spans into export records and drives encoding.
//!
//! The mapper is the only place this core reads ambient trace context:
//! a span finished without an explicit parent picks one up from the
//! carrier when the ambient context belongs to the same trace.

use crate::core::context::{ContextCarrier, ContextSlot, SpanContext};
use crate::core::error::Result;
use crate::core::types::{FinishedSpan, SpanStatus};
use crate::export::protocol::BinaryProtocol;
use crate::export::records::{LogRecord, RecordPools, SpanRecord, SpanRefKind, SpanRefRecord, TagRecord};
use crate::export::SpanSink;
use bytes::BytesMut;
use std::time::{SystemTime, UNIX_EPOCH};

/// Microseconds since the Unix epoch, saturating at zero for times
/// before it.
pub fn micros_since_epoch(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => i64::try_from(elapsed.as_micros()).unwrap_or(i64::MAX),
        Err(_) => 0,
    }
}

/// Maps a finished span into a wire record, borrowing child buffers
/// from `pools`.
pub fn map_span(span: &FinishedSpan, pools: &RecordPools) -> SpanRecord {
    build(span, pools, None)
}

/// Like [`map_span`], but falls back to the ambient span context read
/// through `carrier` when the span has no explicit parent.
pub fn map_span_with_context(
    span: &FinishedSpan,
    pools: &RecordPools,
    carrier: &ContextCarrier,
    slot: ContextSlot,
) -> SpanRecord {
    build(span, pools, carrier.get(slot))
}

fn build(span: &FinishedSpan, pools: &RecordPools, ambient: Option<SpanContext>) -> SpanRecord {
    let parent_span_id = match span.parent_span_id {
        Some(parent) => parent.as_i64(),
        None => ambient
            .filter(|context| context.trace_id == span.trace_id)
            .map(|context| context.span_id.as_i64())
            .unwrap_or(0),
    };

    let mut references = pools.reference_list();
    for link in &span.links {
        references.push(SpanRefRecord {
            ref_type: if link.follows_from {
                SpanRefKind::FollowsFrom
            } else {
                SpanRefKind::ChildOf
            },
            trace_id_low: link.trace_id.low(),
            trace_id_high: link.trace_id.high(),
            span_id: link.span_id.as_i64(),
        });
    }

    let mut tags = pools.tag_list();
    if let Some(label) = span.kind.label() {
        tags.push(TagRecord::new("span.kind", label));
    }
    for (key, value) in &span.attributes {
        tags.push(TagRecord {
            key: key.clone(),
            value: value.clone(),
        });
    }
    match &span.status {
        SpanStatus::Unset => {},
        SpanStatus::Ok => {
            tags.push(TagRecord::new("otel.status_code", "OK"));
        },
        SpanStatus::Error(message) => {
            tags.push(TagRecord::new("otel.status_code", "ERROR"));
            tags.push(TagRecord::new("error", true));
            if !message.is_empty() {
                tags.push(TagRecord::new("otel.status_description", message.as_str()));
            }
        },
    }

    let mut logs = pools.log_list();
    for event in &span.events {
        let mut fields = pools.tag_list();
        fields.push(TagRecord::new("event", event.name.as_str()));
        for (key, value) in &event.attributes {
            fields.push(TagRecord {
                key: key.clone(),
                value: value.clone(),
            });
        }
        logs.push(LogRecord {
            timestamp: micros_since_epoch(event.timestamp),
            fields,
        });
    }

    SpanRecord {
        trace_id_low: span.trace_id.low(),
        trace_id_high: span.trace_id.high(),
        span_id: span.span_id.as_i64(),
        parent_span_id,
        operation_name: span.operation_name.clone(),
        references,
        flags: span.flags,
        start_time: micros_since_epoch(span.start_time),
        duration: i64::try_from(span.duration.as_micros()).unwrap_or(i64::MAX),
        tags,
        logs,
    }
}

/// Maps, encodes, and hands one span to the sink. Record buffers are
/// returned to the pools on every path, including encode failures.
pub fn export_span(
    span: &FinishedSpan,
    pools: &RecordPools,
    sink: &dyn SpanSink,
    recursion_limit: usize,
) -> Result<()> {
    let mut record = map_span(span, pools);
    let mut protocol = BinaryProtocol::with_recursion_limit(BytesMut::with_capacity(256), recursion_limit);
    let written = record.write(&mut protocol);
    let released = record.release();
    written?;
    released?;
    sink.consume(protocol.into_inner().freeze())
}
