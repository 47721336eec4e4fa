//! End-to-end pipeline tests: instrument calls through aggregation to
//! exporter batches, and finished spans through pooled records to wire
//! bytes.

use bytes::Bytes;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, UNIX_EPOCH};
use tracekit::core::{Config, FinishedSpan, SpanEvent, SpanId, SpanKind, SpanStatus, TraceId, Value};
use tracekit::export::{export_span, RecordPools, SpanSink};
use tracekit::metrics::{
    InstrumentDescriptor, InstrumentKind, KeyValue, MetricRegistry, NumericKind, PointValue,
};
use tracekit::Result;

fn delta_registry() -> MetricRegistry {
    let config = Config::from_yaml("metrics:\n  temporality: delta\n").unwrap();
    MetricRegistry::new(config.metrics)
}

#[test]
fn test_concurrent_counter_aggregation() {
    let registry = delta_registry();
    let requests = registry
        .register(
            InstrumentDescriptor::new(
                "http.server.requests",
                "completed requests",
                "1",
                "http",
                NumericKind::Long,
                InstrumentKind::Counter,
            )
            .unwrap(),
        )
        .unwrap();

    let mut handles = Vec::new();
    for thread_id in 0..8 {
        let requests = Arc::clone(&requests);
        handles.push(thread::spawn(move || {
            for i in 0..1000 {
                let route = if i % 2 == 0 { "/users" } else { "/orders" };
                // attribute order varies per call site; identity must not
                let attrs = if thread_id % 2 == 0 {
                    vec![KeyValue::new("route", route), KeyValue::new("code", 200i64)]
                } else {
                    vec![KeyValue::new("code", 200i64), KeyValue::new("route", route)]
                };
                requests.update_long(1, &attrs);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    requests.snapshot();
    let batch = requests.points();
    assert_eq!(batch.len(), 2);
    let total: i64 = batch
        .points()
        .iter()
        .map(|p| match p.value {
            PointValue::LongSum(v) => v,
            ref other => panic!("expected long sum, got {:?}", other),
        })
        .sum();
    assert_eq!(total, 8000);

    // Delta temporality: a fresh snapshot reports zeros.
    requests.snapshot();
    let empty = requests.points();
    for point in empty.points() {
        assert_eq!(point.value, PointValue::LongSum(0));
    }
}

#[test]
fn test_histogram_collection_cycle() {
    let registry = delta_registry();
    let latency = registry
        .register_with(
            InstrumentDescriptor::new(
                "http.server.duration",
                "request latency",
                "ms",
                "http",
                NumericKind::Double,
                InstrumentKind::Histogram,
            )
            .unwrap(),
            tracekit::metrics::MetricOptions {
                histogram_bounds: Some(vec![10.0, 20.0]),
                ..Default::default()
            },
        )
        .unwrap();

    for value in [5.0, 10.0, 15.0, 25.0] {
        latency.update_double(value, &[KeyValue::new("route", "/users")]);
    }

    let collected = registry.collect();
    assert_eq!(collected.len(), 1);
    let (_, batch) = &collected[0];
    match &batch.points()[0].value {
        PointValue::Histogram { count, sum, bucket_counts } => {
            assert_eq!(*count, 4);
            assert_eq!(*sum, 55.0);
            assert_eq!(bucket_counts, &vec![2, 1, 1]);
        },
        other => panic!("expected histogram, got {:?}", other),
    }
}

struct CaptureSink(Mutex<Vec<Bytes>>);

impl SpanSink for CaptureSink {
    fn consume(&self, encoded: Bytes) -> Result<()> {
        self.0.lock().push(encoded);
        Ok(())
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[test]
fn test_span_export_round_trip() {
    let config = Config::default();
    let pools = RecordPools::from_config(&config.export);
    let sink = CaptureSink(Mutex::new(Vec::new()));

    let span = FinishedSpan::builder()
        .trace_id(TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap())
        .span_id(SpanId::from_hex("00f067aa0ba902b7").unwrap())
        .operation_name("GET /users")
        .kind(SpanKind::Server)
        .start_time(UNIX_EPOCH + Duration::from_secs(1_700_000_000))
        .duration(Duration::from_millis(42))
        .status(SpanStatus::Error("upstream timeout".to_owned()))
        .attribute("http.status_code", 504i64)
        .event(SpanEvent {
            timestamp: UNIX_EPOCH + Duration::from_secs(1_700_000_001),
            name: "retry".to_owned(),
            attributes: vec![("attempt".to_owned(), Value::Long(2))],
        })
        .build()
        .unwrap();

    export_span(&span, &pools, &sink, config.export.max_recursion_depth).unwrap();

    let captured = sink.0.lock();
    assert_eq!(captured.len(), 1);
    let bytes = &captured[0];

    // mandatory numeric fields and the operation name
    assert!(contains(bytes, &[10, 0, 1]));
    assert!(contains(bytes, b"GET /users"));
    // tags field present (error status produced tags)
    assert!(contains(bytes, &[15, 0, 10]));
    // logs field present (one event)
    assert!(contains(bytes, &[15, 0, 11]));
    // no references were attached
    assert!(!contains(bytes, &[15, 0, 6]));

    // every borrowed buffer is back: the span tag list and the event's
    // field list both came from the tag pool
    assert_eq!(pools.available_tag_buffers(), 2);
}

#[test]
fn test_span_without_tags_omits_field() {
    let pools = RecordPools::default();
    let sink = CaptureSink(Mutex::new(Vec::new()));

    let span = FinishedSpan::builder()
        .trace_id(TraceId::from_bytes([1; 16]))
        .span_id(SpanId::from_bytes([2; 8]))
        .operation_name("tick")
        .build()
        .unwrap();

    export_span(&span, &pools, &sink, 64).unwrap();

    let captured = sink.0.lock();
    let bytes = &captured[0];
    assert!(!contains(bytes, &[15, 0, 10]));
    assert!(!contains(bytes, &[15, 0, 11]));
}

#[test]
fn test_many_spans_reuse_pooled_buffers() {
    let pools = RecordPools::default();
    let sink = CaptureSink(Mutex::new(Vec::new()));

    for i in 0..100 {
        let span = FinishedSpan::builder()
            .trace_id(TraceId::from_bytes([1; 16]))
            .span_id(SpanId::from_bytes([(i % 255) as u8 + 1; 8]))
            .operation_name("work")
            .attribute("iteration", i as i64)
            .build()
            .unwrap();
        export_span(&span, &pools, &sink, 64).unwrap();
    }

    assert_eq!(sink.0.lock().len(), 100);
    // steady state: one tag buffer cycling through the pool
    assert_eq!(pools.available_tag_buffers(), 1);
}
