use crate::core::error::{Result, TracekitError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};

/// Unique identifier for a trace (128 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId([u8; 16]);

/// Unique identifier for a span within a trace (64 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId([u8; 8]);

impl TraceId {
    /// Creates a trace ID from raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        TraceId(bytes)
    }

    /// Parses a trace ID from its 32-character hex representation.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != 32 {
            return Err(TracekitError::invalid_span(format!(
                "TraceId must be 32 hex characters, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| TracekitError::invalid_span(format!("TraceId not valid hex: {}", e)))?;
        Ok(TraceId(bytes))
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// High 64 bits as a signed integer, big-endian byte order.
    #[inline]
    pub fn high(&self) -> i64 {
        let mut b = [0u8; 8];
        b.copy_from_slice(&self.0[..8]);
        i64::from_be_bytes(b)
    }

    /// Low 64 bits as a signed integer, big-endian byte order.
    #[inline]
    pub fn low(&self) -> i64 {
        let mut b = [0u8; 8];
        b.copy_from_slice(&self.0[8..]);
        i64::from_be_bytes(b)
    }

    /// Returns true unless every byte is zero.
    pub fn is_valid(&self) -> bool {
        self.0 != [0u8; 16]
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl SpanId {
    /// Creates a span ID from raw bytes.
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        SpanId(bytes)
    }

    /// Parses a span ID from its 16-character hex representation.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != 16 {
            return Err(TracekitError::invalid_span(format!(
                "SpanId must be 16 hex characters, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 8];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| TracekitError::invalid_span(format!("SpanId not valid hex: {}", e)))?;
        Ok(SpanId(bytes))
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// The ID as a signed integer, big-endian byte order.
    #[inline]
    pub fn as_i64(&self) -> i64 {
        i64::from_be_bytes(self.0)
    }

    /// Returns true unless every byte is zero.
    pub fn is_valid(&self) -> bool {
        self.0 != [0u8; 8]
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A typed attribute value attached to spans, events, and export tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// UTF-8 string value
    Str(String),
    /// 64-bit float value
    Double(f64),
    /// Boolean value
    Bool(bool),
    /// Signed 64-bit integer value
    Long(i64),
    /// Raw binary value
    Binary(Vec<u8>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

/// Status of a span execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SpanStatus {
    /// No status recorded
    Unset,
    /// Span completed successfully
    Ok,
    /// Span completed with an error
    Error(String),
}

impl SpanStatus {
    /// Returns true if the span status indicates an error
    pub fn is_error(&self) -> bool {
        matches!(self, SpanStatus::Error(_))
    }

    /// Returns the error message if this is an error status
    pub fn error_message(&self) -> Option<&str> {
        match self {
            SpanStatus::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Role of a span relative to its trace neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanKind {
    /// Internal operation, no remote party
    Internal,
    /// Handles a remote request
    Server,
    /// Issues a remote request
    Client,
    /// Sends to a message broker
    Producer,
    /// Receives from a message broker
    Consumer,
}

impl SpanKind {
    /// The wire-convention label, or `None` for internal spans which
    /// carry no kind tag.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            SpanKind::Internal => None,
            SpanKind::Server => Some("server"),
            SpanKind::Client => Some("client"),
            SpanKind::Producer => Some("producer"),
            SpanKind::Consumer => Some("consumer"),
        }
    }
}

/// A timestamped annotation recorded while a span was live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    /// When the event occurred
    pub timestamp: SystemTime,
    /// Event name
    pub name: String,
    /// Typed attributes attached to the event
    pub attributes: Vec<(String, Value)>,
}

/// A causal reference from one span to another.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpanLink {
    /// Trace containing the linked span
    pub trace_id: TraceId,
    /// The linked span
    pub span_id: SpanId,
    /// True for follows-from causality, false for child-of
    pub follows_from: bool,
}

/// A completed span ready for export mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishedSpan {
    /// Trace this span belongs to
    pub trace_id: TraceId,
    /// This span's identifier
    pub span_id: SpanId,
    /// Parent span, if any
    pub parent_span_id: Option<SpanId>,
    /// Name of the operation this span represents
    pub operation_name: String,
    /// Role of the span
    pub kind: SpanKind,
    /// When the span started
    pub start_time: SystemTime,
    /// How long the span took to complete
    pub duration: Duration,
    /// Status of the span execution
    pub status: SpanStatus,
    /// Trace flags (bit 0 = sampled)
    pub flags: i32,
    /// Typed span attributes
    pub attributes: Vec<(String, Value)>,
    /// Timestamped events recorded during the span
    pub events: Vec<SpanEvent>,
    /// References to other spans
    pub links: Vec<SpanLink>,
}

impl FinishedSpan {
    /// Creates a new span builder
    pub fn builder() -> FinishedSpanBuilder {
        FinishedSpanBuilder::default()
    }

    /// Returns the end time of the span
    pub fn end_time(&self) -> SystemTime {
        self.start_time + self.duration
    }

    /// Returns true if this span is a root span (has no parent)
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }
}

/// Builder for creating FinishedSpan instances
#[derive(Default)]
pub struct FinishedSpanBuilder {
    trace_id: Option<TraceId>,
    span_id: Option<SpanId>,
    parent_span_id: Option<SpanId>,
    operation_name: Option<String>,
    kind: Option<SpanKind>,
    start_time: Option<SystemTime>,
    duration: Option<Duration>,
    status: Option<SpanStatus>,
    flags: Option<i32>,
    attributes: Vec<(String, Value)>,
    events: Vec<SpanEvent>,
    links: Vec<SpanLink>,
}

impl FinishedSpanBuilder {
    pub fn trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn span_id(mut self, span_id: SpanId) -> Self {
        self.span_id = Some(span_id);
        self
    }

    pub fn parent_span_id(mut self, parent_span_id: SpanId) -> Self {
        self.parent_span_id = Some(parent_span_id);
        self
    }

    pub fn operation_name<S: Into<String>>(mut self, operation_name: S) -> Self {
        self.operation_name = Some(operation_name.into());
        self
    }

    pub fn kind(mut self, kind: SpanKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn start_time(mut self, start_time: SystemTime) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn status(mut self, status: SpanStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn flags(mut self, flags: i32) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn attribute<S: Into<String>, V: Into<Value>>(mut self, key: S, value: V) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn event(mut self, event: SpanEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn link(mut self, link: SpanLink) -> Self {
        self.links.push(link);
        self
    }

    /// Validates required fields and builds the span.
    pub fn build(self) -> Result<FinishedSpan> {
        let trace_id = self
            .trace_id
            .ok_or_else(|| TracekitError::invalid_span("trace_id is required"))?;
        let span_id = self
            .span_id
            .ok_or_else(|| TracekitError::invalid_span("span_id is required"))?;
        if !trace_id.is_valid() {
            return Err(TracekitError::invalid_span("trace_id must be non-zero"));
        }
        if !span_id.is_valid() {
            return Err(TracekitError::invalid_span("span_id must be non-zero"));
        }
        let operation_name = self
            .operation_name
            .ok_or_else(|| TracekitError::invalid_span("operation_name is required"))?;

        Ok(FinishedSpan {
            trace_id,
            span_id,
            parent_span_id: self.parent_span_id,
            operation_name,
            kind: self.kind.unwrap_or(SpanKind::Internal),
            start_time: self.start_time.unwrap_or_else(SystemTime::now),
            duration: self.duration.unwrap_or_default(),
            status: self.status.unwrap_or(SpanStatus::Unset),
            // Sampled by default: unsampled spans never reach the exporter.
            flags: self.flags.unwrap_or(1),
            attributes: self.attributes,
            events: self.events,
            links: self.links,
        })
    }
}
